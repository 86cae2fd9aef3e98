mod postgres_cronjob_repository;
mod postgres_execution_repository;

pub use postgres_cronjob_repository::PostgresCronJobRepository;
pub use postgres_execution_repository::PostgresExecutionRepository;
