pub mod entities;
pub mod repositories;

pub use entities::*;
pub use repositories::*;
pub use cronjobd_core::{SchedulerError, SchedulerResult};
