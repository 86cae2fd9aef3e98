//! 持久化层实现
//!
//! 按连接串自动选择PostgreSQL或嵌入式SQLite后端，领域层只依赖
//! 仓储抽象。

pub mod database;

pub use database::{create_repositories, DatabasePool, DatabaseType};
