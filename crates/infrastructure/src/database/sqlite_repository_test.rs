//! 嵌入式SQLite仓储的集成测试

use tempfile::TempDir;

use cronjobd_core::DatabaseConfig;
use cronjobd_domain::{CronJobUpdate, ExecutionStatus, NewCronJob};

use super::manager::{create_repositories, DatabasePool};

async fn embedded_pool(dir: &TempDir) -> DatabasePool {
    let db_path = dir.path().join("cronjobd_test.db");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", db_path.display()),
        max_connections: 5,
        connect_timeout_seconds: 5,
    };
    let pool = DatabasePool::connect(&config).await.unwrap();
    pool.run_migrations().await.unwrap();
    pool
}

fn new_job(name: &str, enabled: bool) -> NewCronJob {
    NewCronJob {
        name: name.to_string(),
        schedule: "*/5 * * * *".to_string(),
        command: "echo hi".to_string(),
        enabled,
    }
}

#[tokio::test]
async fn test_cronjob_crud_round_trip() {
    let dir = TempDir::new().unwrap();
    let pool = embedded_pool(&dir).await;
    let (jobs, _) = create_repositories(&pool);

    let created = jobs.create(&new_job("backup", true)).await.unwrap();
    assert!(created.id > 0);
    assert_eq!(created.name, "backup");
    assert!(created.enabled);

    let fetched = jobs.find_by_id(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.schedule, "*/5 * * * *");
    assert!(jobs.find_by_id(created.id + 100).await.unwrap().is_none());

    let updated = jobs
        .update(
            created.id,
            &CronJobUpdate {
                command: Some("echo bye".to_string()),
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.command, "echo bye");
    assert!(!updated.enabled);
    // 未更新的字段保持原值
    assert_eq!(updated.name, "backup");
    assert!(updated.updated_at >= created.updated_at);

    assert!(jobs.delete(created.id).await.unwrap());
    assert!(!jobs.delete(created.id).await.unwrap());
    assert!(jobs.find_by_id(created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_find_enabled_filters_disabled_jobs() {
    let dir = TempDir::new().unwrap();
    let pool = embedded_pool(&dir).await;
    let (jobs, _) = create_repositories(&pool);

    jobs.create(&new_job("on", true)).await.unwrap();
    jobs.create(&new_job("off", false)).await.unwrap();

    let enabled = jobs.find_enabled().await.unwrap();
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].name, "on");
    assert_eq!(jobs.find_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_execution_records_lifecycle_fields() {
    let dir = TempDir::new().unwrap();
    let pool = embedded_pool(&dir).await;
    let (jobs, executions) = create_repositories(&pool);

    let job = jobs.create(&new_job("logs", true)).await.unwrap();

    let running = executions
        .record_execution(job.id, ExecutionStatus::Running, None, None)
        .await
        .unwrap();
    assert_eq!(running.status, ExecutionStatus::Running);
    assert!(running.completed_at.is_none());

    let completed = executions
        .record_execution(
            job.id,
            ExecutionStatus::Completed,
            Some("hi\n".to_string()),
            None,
        )
        .await
        .unwrap();
    assert!(completed.completed_at.is_some());
    assert_eq!(completed.output.as_deref(), Some("hi\n"));

    let failed = executions
        .record_execution(
            job.id,
            ExecutionStatus::Failed,
            None,
            Some("execution timed out".to_string()),
        )
        .await
        .unwrap();
    assert!(failed.completed_at.is_some());
    assert_eq!(failed.error_message.as_deref(), Some("execution timed out"));

    let history = executions.find_by_cronjob_id(job.id, 50).await.unwrap();
    assert_eq!(history.len(), 3);
    // 按开始时间倒序
    assert!(history
        .windows(2)
        .all(|pair| pair[0].started_at >= pair[1].started_at));

    let limited = executions.find_by_cronjob_id(job.id, 2).await.unwrap();
    assert_eq!(limited.len(), 2);
}

#[tokio::test]
async fn test_deleting_job_cascades_to_executions() {
    let dir = TempDir::new().unwrap();
    let pool = embedded_pool(&dir).await;
    let (jobs, executions) = create_repositories(&pool);

    let job = jobs.create(&new_job("gone", true)).await.unwrap();
    executions
        .record_execution(job.id, ExecutionStatus::Running, None, None)
        .await
        .unwrap();

    assert!(jobs.delete(job.id).await.unwrap());
    let history = executions.find_by_cronjob_id(job.id, 50).await.unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_health_check() {
    let dir = TempDir::new().unwrap();
    let pool = embedded_pool(&dir).await;
    pool.health_check().await.unwrap();
}
