use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use cronjobd_core::SchedulerResult;
use cronjobd_domain::{ExecutionRepository, ExecutionStatus, JobExecution};

pub struct PostgresExecutionRepository {
    pool: PgPool,
}

impl PostgresExecutionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn map_row(row: &PgRow) -> Result<JobExecution, sqlx::Error> {
    Ok(JobExecution {
        id: row.try_get("id")?,
        cronjob_id: row.try_get("cronjob_id")?,
        status: row.try_get("status")?,
        output: row.try_get("output")?,
        error_message: row.try_get("error_message")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[async_trait]
impl ExecutionRepository for PostgresExecutionRepository {
    async fn record_execution(
        &self,
        cronjob_id: i64,
        status: ExecutionStatus,
        output: Option<String>,
        error_message: Option<String>,
    ) -> SchedulerResult<JobExecution> {
        // running记录只有started_at，终态记录同时落completed_at
        let now = Utc::now();
        let completed_at = status.is_terminal().then_some(now);
        let row = sqlx::query(
            r#"
            INSERT INTO cronjob_executions
                (cronjob_id, status, output, error_message, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, cronjob_id, status, output, error_message, started_at, completed_at
            "#,
        )
        .bind(cronjob_id)
        .bind(status)
        .bind(&output)
        .bind(&error_message)
        .bind(now)
        .bind(completed_at)
        .fetch_one(&self.pool)
        .await?;

        map_row(&row).map_err(Into::into)
    }

    async fn find_by_cronjob_id(
        &self,
        cronjob_id: i64,
        limit: i64,
    ) -> SchedulerResult<Vec<JobExecution>> {
        let rows = sqlx::query(
            r#"
            SELECT id, cronjob_id, status, output, error_message, started_at, completed_at
            FROM cronjob_executions
            WHERE cronjob_id = $1
            ORDER BY started_at DESC
            LIMIT $2
            "#,
        )
        .bind(cronjob_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect::<Result<_, _>>().map_err(Into::into)
    }
}
