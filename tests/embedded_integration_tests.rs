//! 嵌入式SQLite下的调度器集成测试

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;
use tokio::time::{sleep, timeout};

use cronjobd::{Application, ShutdownManager};
use cronjobd_core::{AppConfig, DatabaseConfig, ExecutorConfig};
use cronjobd_domain::{CronJobRepository, ExecutionRepository, ExecutionStatus, NewCronJob};
use cronjobd_engine::{JobScheduler, ShellRunner};
use cronjobd_infrastructure::{create_repositories, DatabasePool};

struct EmbeddedSetup {
    _temp_dir: TempDir,
    jobs: Arc<dyn CronJobRepository>,
    executions: Arc<dyn ExecutionRepository>,
    scheduler: Arc<JobScheduler>,
}

async fn embedded_setup() -> Result<EmbeddedSetup> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("engine_test.db");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", db_path.display()),
        max_connections: 5,
        connect_timeout_seconds: 5,
    };
    let pool = DatabasePool::connect(&config).await?;
    pool.run_migrations().await?;

    let (jobs, executions) = create_repositories(&pool);
    let scheduler = Arc::new(JobScheduler::new(
        jobs.clone(),
        executions.clone(),
        Arc::new(ShellRunner::new()),
        &ExecutorConfig::default(),
    ));

    Ok(EmbeddedSetup {
        _temp_dir: temp_dir,
        jobs,
        executions,
        scheduler,
    })
}

fn job(name: &str, schedule: &str, command: &str, enabled: bool) -> NewCronJob {
    NewCronJob {
        name: name.to_string(),
        schedule: schedule.to_string(),
        command: command.to_string(),
        enabled,
    }
}

#[tokio::test]
async fn test_initialize_arms_enabled_jobs_and_fires() -> Result<()> {
    let setup = embedded_setup().await?;
    let created = setup
        .jobs
        .create(&job("ping", "* * * * * *", "echo hi", true))
        .await?;

    let armed = setup.scheduler.initialize().await?;
    assert_eq!(armed, 1);
    assert!(setup.scheduler.is_scheduled(created.id).await);

    sleep(Duration::from_millis(2500)).await;
    setup.scheduler.shutdown().await;

    let history = setup
        .executions
        .find_by_cronjob_id(created.id, 50)
        .await?;
    let completed: Vec<_> = history
        .iter()
        .filter(|r| r.status == ExecutionStatus::Completed)
        .collect();
    assert!(!completed.is_empty(), "history: {history:?}");
    assert!(completed[0].output.as_deref().unwrap().contains("hi"));
    assert!(completed[0].completed_at.is_some());
    Ok(())
}

#[tokio::test]
async fn test_initialize_never_arms_disabled_jobs() -> Result<()> {
    let setup = embedded_setup().await?;
    let disabled = setup
        .jobs
        .create(&job("off", "* * * * *", "echo nope", false))
        .await?;

    let armed = setup.scheduler.initialize().await?;
    assert_eq!(armed, 0);
    assert!(!setup.scheduler.is_scheduled(disabled.id).await);
    assert!(setup.scheduler.active_job_ids().await.is_empty());

    setup.scheduler.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_initialize_records_invalid_schedule_and_continues() -> Result<()> {
    let setup = embedded_setup().await?;
    let broken = setup
        .jobs
        .create(&job("broken", "not-a-cron", "echo x", true))
        .await?;
    let healthy = setup
        .jobs
        .create(&job("healthy", "0 0 1 1 *", "echo y", true))
        .await?;

    let armed = setup.scheduler.initialize().await?;
    assert_eq!(armed, 1);
    assert!(!setup.scheduler.is_scheduled(broken.id).await);
    assert!(setup.scheduler.is_scheduled(healthy.id).await);

    let history = setup.executions.find_by_cronjob_id(broken.id, 50).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, ExecutionStatus::Failed);
    assert!(history[0]
        .error_message
        .as_deref()
        .unwrap()
        .contains("Invalid cron schedule"));

    setup.scheduler.shutdown().await;
    Ok(())
}

#[tokio::test]
async fn test_application_starts_and_shuts_down_gracefully() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("app_test.db");

    let mut config = AppConfig::default();
    config.database.url = format!("sqlite://{}", db_path.display());
    config.server.bind_address = "127.0.0.1:0".to_string();

    let app = Application::new(config).await?;
    let shutdown = Arc::new(ShutdownManager::new());
    let shutdown_rx = shutdown.subscribe();

    let run_handle = tokio::spawn(async move { app.run(shutdown_rx).await });

    sleep(Duration::from_millis(300)).await;
    shutdown.shutdown().await;

    let result = timeout(Duration::from_secs(5), run_handle).await??;
    assert!(result.is_ok(), "run returned: {result:?}");
    Ok(())
}
