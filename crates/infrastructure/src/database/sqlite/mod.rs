mod sqlite_cronjob_repository;
mod sqlite_execution_repository;

pub use sqlite_cronjob_repository::SqliteCronJobRepository;
pub use sqlite_execution_repository::SqliteExecutionRepository;
