//! HTTP API层
//!
//! 对任务定义的CRUD操作在落库后直接调用调度编排接口
//! （schedule/restart/stop），让注册表与持久化状态收敛。

pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use response::ApiResponse;
pub use routes::{create_routes, AppState};
