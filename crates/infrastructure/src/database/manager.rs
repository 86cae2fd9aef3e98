use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::{PgPool, SqlitePool};
use tracing::{debug, info};

use cronjobd_core::{DatabaseConfig, SchedulerError, SchedulerResult};
use cronjobd_domain::{CronJobRepository, ExecutionRepository};

use super::postgres::{PostgresCronJobRepository, PostgresExecutionRepository};
use super::sqlite::{SqliteCronJobRepository, SqliteExecutionRepository};

/// Database type detection (KISS principle)
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseType {
    PostgreSQL,
    SQLite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> Self {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            DatabaseType::PostgreSQL
        } else {
            DatabaseType::SQLite
        }
    }
}

/// Database connection pool enum (Open/Closed principle)
pub enum DatabasePool {
    PostgreSQL(PgPool),
    SQLite(SqlitePool),
}

impl DatabasePool {
    /// Create pool from config with automatic type detection
    pub async fn connect(config: &DatabaseConfig) -> SchedulerResult<Self> {
        match DatabaseType::from_url(&config.url) {
            DatabaseType::PostgreSQL => {
                let pool = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
                    .connect(&config.url)
                    .await
                    .map_err(SchedulerError::Database)?;
                Ok(DatabasePool::PostgreSQL(pool))
            }
            DatabaseType::SQLite => {
                // 启用外键约束和WAL模式
                let connect_options = sqlx::sqlite::SqliteConnectOptions::from_str(&config.url)
                    .map_err(SchedulerError::Database)?
                    .create_if_missing(true)
                    .foreign_keys(true)
                    .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);
                let pool = sqlx::sqlite::SqlitePoolOptions::new()
                    .max_connections(config.max_connections)
                    .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds))
                    .connect_with(connect_options)
                    .await
                    .map_err(SchedulerError::Database)?;
                Ok(DatabasePool::SQLite(pool))
            }
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        match self {
            DatabasePool::PostgreSQL(_) => DatabaseType::PostgreSQL,
            DatabasePool::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// 幂等建表，进程启动时执行
    pub async fn run_migrations(&self) -> SchedulerResult<()> {
        debug!("Running database migrations");
        match self {
            DatabasePool::PostgreSQL(pool) => {
                for statement in POSTGRES_MIGRATIONS {
                    sqlx::query(statement).execute(pool).await?;
                }
            }
            DatabasePool::SQLite(pool) => {
                for statement in SQLITE_MIGRATIONS {
                    sqlx::query(statement).execute(pool).await?;
                }
            }
        }
        info!("数据库迁移完成");
        Ok(())
    }

    pub async fn health_check(&self) -> SchedulerResult<()> {
        match self {
            DatabasePool::PostgreSQL(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            DatabasePool::SQLite(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(())
    }
}

/// 按连接的后端构造仓储实例
pub fn create_repositories(
    pool: &DatabasePool,
) -> (Arc<dyn CronJobRepository>, Arc<dyn ExecutionRepository>) {
    match pool {
        DatabasePool::PostgreSQL(pool) => (
            Arc::new(PostgresCronJobRepository::new(pool.clone())),
            Arc::new(PostgresExecutionRepository::new(pool.clone())),
        ),
        DatabasePool::SQLite(pool) => (
            Arc::new(SqliteCronJobRepository::new(pool.clone())),
            Arc::new(SqliteExecutionRepository::new(pool.clone())),
        ),
    }
}

const POSTGRES_MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS cronjobs (
        id          BIGSERIAL PRIMARY KEY,
        name        TEXT NOT NULL,
        schedule    TEXT NOT NULL,
        command     TEXT NOT NULL,
        enabled     BOOLEAN NOT NULL DEFAULT TRUE,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cronjob_executions (
        id            BIGSERIAL PRIMARY KEY,
        cronjob_id    BIGINT NOT NULL REFERENCES cronjobs(id) ON DELETE CASCADE,
        status        TEXT NOT NULL,
        output        TEXT,
        error_message TEXT,
        started_at    TIMESTAMPTZ NOT NULL DEFAULT now(),
        completed_at  TIMESTAMPTZ
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cronjobs_enabled ON cronjobs(enabled)",
    "CREATE INDEX IF NOT EXISTS idx_cronjob_executions_cronjob_id ON cronjob_executions(cronjob_id)",
    "CREATE INDEX IF NOT EXISTS idx_cronjob_executions_started_at ON cronjob_executions(started_at)",
];

const SQLITE_MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS cronjobs (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        name        TEXT NOT NULL,
        schedule    TEXT NOT NULL,
        command     TEXT NOT NULL,
        enabled     BOOLEAN NOT NULL DEFAULT TRUE,
        created_at  DATETIME NOT NULL,
        updated_at  DATETIME NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cronjob_executions (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        cronjob_id    INTEGER NOT NULL REFERENCES cronjobs(id) ON DELETE CASCADE,
        status        TEXT NOT NULL,
        output        TEXT,
        error_message TEXT,
        started_at    DATETIME NOT NULL,
        completed_at  DATETIME
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_cronjobs_enabled ON cronjobs(enabled)",
    "CREATE INDEX IF NOT EXISTS idx_cronjob_executions_cronjob_id ON cronjob_executions(cronjob_id)",
    "CREATE INDEX IF NOT EXISTS idx_cronjob_executions_started_at ON cronjob_executions(started_at)",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_type_detection() {
        assert_eq!(
            DatabaseType::from_url("postgres://localhost/db"),
            DatabaseType::PostgreSQL
        );
        assert_eq!(
            DatabaseType::from_url("postgresql://localhost/db"),
            DatabaseType::PostgreSQL
        );
        assert_eq!(
            DatabaseType::from_url("sqlite://cronjobd.db"),
            DatabaseType::SQLite
        );
    }
}
