//! HTTP API端到端集成测试（嵌入式SQLite）

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use cronjobd_api::{create_routes, AppState};
use cronjobd_core::{DatabaseConfig, ExecutorConfig};
use cronjobd_engine::{JobScheduler, ShellRunner};
use cronjobd_infrastructure::{create_repositories, DatabasePool};

struct TestServer {
    _temp_dir: TempDir,
    addr: SocketAddr,
    scheduler: Arc<JobScheduler>,
    server: JoinHandle<()>,
}

impl TestServer {
    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn spawn_server() -> Result<TestServer> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("api_test.db");
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

    let state = AppState {
        jobs,
        executions,
        scheduler: scheduler.clone(),
    };
    let router = create_routes(state, true);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    Ok(TestServer {
        _temp_dir: temp_dir,
        addr,
        scheduler,
        server,
    })
}

async fn create_job(client: &Client, server: &TestServer, body: Value) -> Result<(u16, Value)> {
    let resp = client
        .post(server.url("/api/cronjobs"))
        .json(&body)
        .send()
        .await?;
    let status = resp.status().as_u16();
    Ok((status, resp.json().await?))
}

#[tokio::test]
async fn test_create_lists_and_arms_job() -> Result<()> {
    let server = spawn_server().await?;
    let client = Client::new();

    let (status, body) = create_job(
        &client,
        &server,
        json!({"name": "ping", "schedule": "0 0 1 1 *", "command": "echo hi"}),
    )
    .await?;
    assert_eq!(status, 201);
    assert_eq!(body["success"], json!(true));
    let id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["enabled"], json!(true));

    // 创建成功即armed
    assert!(server.scheduler.is_scheduled(id).await);

    let resp: Value = client
        .get(server.url("/api/cronjobs"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["data"].as_array().unwrap().len(), 1);

    let one: Value = client
        .get(server.url(&format!("/api/cronjobs/{id}")))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(one["data"]["name"], json!("ping"));
    Ok(())
}

#[tokio::test]
async fn test_invalid_schedule_creates_but_never_arms() -> Result<()> {
    let server = spawn_server().await?;
    let client = Client::new();

    let (status, body) = create_job(
        &client,
        &server,
        json!({"name": "broken", "schedule": "not-a-cron", "command": "echo x"}),
    )
    .await?;
    // 定义落库成功，只是没有被调度
    assert_eq!(status, 201);
    assert_eq!(body["success"], json!(true));
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("未调度"));
    let id = body["data"]["id"].as_i64().unwrap();
    assert!(!server.scheduler.is_scheduled(id).await);

    // 校验失败通过执行历史可见
    let history: Value = client
        .get(server.url(&format!("/api/cronjobs/{id}/executions")))
        .send()
        .await?
        .json()
        .await?;
    let records = history["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["status"], json!("failed"));
    Ok(())
}

#[tokio::test]
async fn test_create_rejects_missing_fields() -> Result<()> {
    let server = spawn_server().await?;
    let client = Client::new();

    let (status, body) = create_job(
        &client,
        &server,
        json!({"name": "", "schedule": "* * * * *", "command": "echo hi"}),
    )
    .await?;
    assert_eq!(status, 400);
    assert_eq!(body["success"], json!(false));
    Ok(())
}

#[tokio::test]
async fn test_get_unknown_job_returns_404() -> Result<()> {
    let server = spawn_server().await?;
    let client = Client::new();

    let resp = client.get(server.url("/api/cronjobs/12345")).send().await?;
    assert_eq!(resp.status().as_u16(), 404);
    Ok(())
}

#[tokio::test]
async fn test_update_flips_enabled_and_registry_converges() -> Result<()> {
    let server = spawn_server().await?;
    let client = Client::new();

    let (_, body) = create_job(
        &client,
        &server,
        json!({"name": "toggle", "schedule": "0 0 1 1 *", "command": "echo a"}),
    )
    .await?;
    let id = body["data"]["id"].as_i64().unwrap();
    assert!(server.scheduler.is_scheduled(id).await);

    // 停用
    let resp: Value = client
        .post(server.url(&format!("/api/cronjobs/{id}/update")))
        .json(&json!({"enabled": false}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["data"]["enabled"], json!(false));
    assert!(!server.scheduler.is_scheduled(id).await);

    // 重新启用并替换命令
    let resp: Value = client
        .post(server.url(&format!("/api/cronjobs/{id}/update")))
        .json(&json!({"enabled": true, "command": "echo b"}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["data"]["command"], json!("echo b"));
    assert!(server.scheduler.is_scheduled(id).await);

    // 空更新是参数错误
    let resp = client
        .post(server.url(&format!("/api/cronjobs/{id}/update")))
        .json(&json!({}))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 400);
    Ok(())
}

#[tokio::test]
async fn test_delete_stops_job_and_removes_definition() -> Result<()> {
    let server = spawn_server().await?;
    let client = Client::new();

    let (_, body) = create_job(
        &client,
        &server,
        json!({"name": "gone", "schedule": "0 0 1 1 *", "command": "echo bye"}),
    )
    .await?;
    let id = body["data"]["id"].as_i64().unwrap();
    assert!(server.scheduler.is_scheduled(id).await);

    let resp = client
        .post(server.url(&format!("/api/cronjobs/{id}/delete")))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 200);
    assert!(!server.scheduler.is_scheduled(id).await);

    // 再删一次是404
    let resp = client
        .post(server.url(&format!("/api/cronjobs/{id}/delete")))
        .send()
        .await?;
    assert_eq!(resp.status().as_u16(), 404);
    Ok(())
}

#[tokio::test]
async fn test_execution_history_reflects_firings() -> Result<()> {
    let server = spawn_server().await?;
    let client = Client::new();

    let (_, body) = create_job(
        &client,
        &server,
        json!({"name": "每秒", "schedule": "* * * * * *", "command": "echo hi"}),
    )
    .await?;
    let id = body["data"]["id"].as_i64().unwrap();

    sleep(Duration::from_millis(2500)).await;

    let history: Value = client
        .get(server.url(&format!("/api/cronjobs/{id}/executions?limit=50")))
        .send()
        .await?
        .json()
        .await?;
    let records = history["data"].as_array().unwrap();
    assert!(records
        .iter()
        .any(|r| r["status"] == json!("completed")
            && r["output"].as_str().unwrap_or("").contains("hi")));
    Ok(())
}

#[tokio::test]
async fn test_health_endpoint() -> Result<()> {
    let server = spawn_server().await?;
    let client = Client::new();

    let resp: Value = client
        .get(server.url("/health"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(resp["success"], json!(true));
    assert_eq!(resp["data"]["status"], json!("healthy"));
    Ok(())
}
