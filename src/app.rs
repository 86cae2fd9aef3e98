use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

use cronjobd_api::{create_routes, AppState};
use cronjobd_core::AppConfig;
use cronjobd_domain::{CronJobRepository, ExecutionRepository};
use cronjobd_engine::{JobScheduler, ShellRunner};
use cronjobd_infrastructure::{create_repositories, DatabasePool};

/// 主应用程序
///
/// 组装持久化、调度引擎和HTTP API，并串起启动/关闭顺序。
pub struct Application {
    config: AppConfig,
    jobs: Arc<dyn CronJobRepository>,
    executions: Arc<dyn ExecutionRepository>,
    scheduler: Arc<JobScheduler>,
}

impl Application {
    /// 创建应用实例：连库、迁移、构造仓储和调度器
    pub async fn new(config: AppConfig) -> Result<Self> {
        info!("初始化应用程序");

        let pool = DatabasePool::connect(&config.database)
            .await
            .context("连接数据库失败")?;
        pool.run_migrations().await.context("数据库迁移失败")?;
        pool.health_check().await.context("数据库健康检查失败")?;

        let (jobs, executions) = create_repositories(&pool);
        let scheduler = Arc::new(JobScheduler::new(
            jobs.clone(),
            executions.clone(),
            Arc::new(ShellRunner::new()),
            &config.executor,
        ));

        Ok(Self {
            config,
            jobs,
            executions,
            scheduler,
        })
    }

    /// 运行应用：加载调度、启动HTTP服务，收到关闭信号后按序退出
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let armed = self
            .scheduler
            .initialize()
            .await
            .context("调度器初始化失败")?;
        info!("调度器就绪，{armed} 个任务已激活");

        let state = AppState {
            jobs: self.jobs.clone(),
            executions: self.executions.clone(),
            scheduler: self.scheduler.clone(),
        };
        let router = create_routes(state, self.config.server.cors_enabled);

        let listener = TcpListener::bind(&self.config.server.bind_address)
            .await
            .with_context(|| format!("绑定 {} 失败", self.config.server.bind_address))?;
        info!("HTTP服务监听于 {}", listener.local_addr()?);

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP服务开始优雅关闭");
            })
            .await
            .context("HTTP服务异常退出")?;

        // HTTP服务退出后停掉所有定时器
        self.scheduler.shutdown().await;
        Ok(())
    }

    pub fn scheduler(&self) -> &Arc<JobScheduler> {
        &self.scheduler
    }
}
