use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use cronjobd_core::SchedulerResult;
use cronjobd_domain::{CronJob, CronJobRepository, CronJobUpdate, NewCronJob};

pub struct SqliteCronJobRepository {
    pool: SqlitePool,
}

impl SqliteCronJobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_row(row: &SqliteRow) -> Result<CronJob, sqlx::Error> {
    Ok(CronJob {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        schedule: row.try_get("schedule")?,
        command: row.try_get("command")?,
        enabled: row.try_get("enabled")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl CronJobRepository for SqliteCronJobRepository {
    async fn create(&self, new_job: &NewCronJob) -> SchedulerResult<CronJob> {
        let now = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO cronjobs (name, schedule, command, enabled, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?5)
            RETURNING id, name, schedule, command, enabled, created_at, updated_at
            "#,
        )
        .bind(&new_job.name)
        .bind(&new_job.schedule)
        .bind(&new_job.command)
        .bind(new_job.enabled)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let job = map_row(&row)?;
        debug!("已创建任务定义: {} (ID: {})", job.name, job.id);
        Ok(job)
    }

    async fn find_by_id(&self, id: i64) -> SchedulerResult<Option<CronJob>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, schedule, command, enabled, created_at, updated_at
            FROM cronjobs WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row).transpose().map_err(Into::into)
    }

    async fn find_all(&self) -> SchedulerResult<Vec<CronJob>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, schedule, command, enabled, created_at, updated_at
            FROM cronjobs ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect::<Result<_, _>>().map_err(Into::into)
    }

    async fn find_enabled(&self) -> SchedulerResult<Vec<CronJob>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, schedule, command, enabled, created_at, updated_at
            FROM cronjobs WHERE enabled = TRUE ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_row).collect::<Result<_, _>>().map_err(Into::into)
    }

    async fn update(&self, id: i64, update: &CronJobUpdate) -> SchedulerResult<Option<CronJob>> {
        let row = sqlx::query(
            r#"
            UPDATE cronjobs SET
                name = COALESCE(?2, name),
                schedule = COALESCE(?3, schedule),
                command = COALESCE(?4, command),
                enabled = COALESCE(?5, enabled),
                updated_at = ?6
            WHERE id = ?1
            RETURNING id, name, schedule, command, enabled, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(&update.name)
        .bind(&update.schedule)
        .bind(&update.command)
        .bind(update.enabled)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_row).transpose().map_err(Into::into)
    }

    async fn delete(&self, id: i64) -> SchedulerResult<bool> {
        let result = sqlx::query("DELETE FROM cronjobs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
