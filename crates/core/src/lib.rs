pub mod config;
pub mod errors;

pub use config::{AppConfig, DatabaseConfig, ExecutorConfig, ServerConfig};
pub use errors::{SchedulerError, SchedulerResult};
