use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{error, info, warn};

use cronjobd_core::{ExecutorConfig, SchedulerError, SchedulerResult};
use cronjobd_domain::{CronJob, CronJobRepository, ExecutionRepository, ExecutionStatus};

use crate::execution::ExecutionCycle;
use crate::registry::JobRegistry;
use crate::runner::CommandRunner;

/// 调度编排器
///
/// 外部API层对任务定义的每次变更都通过这里反映到注册表：
/// 创建走 [`schedule_job`]，更新走 [`restart_job`]，删除走 [`stop_job`]。
/// 注册表只在这些调用发生时与持久化状态收敛。
///
/// [`schedule_job`]: JobScheduler::schedule_job
/// [`restart_job`]: JobScheduler::restart_job
/// [`stop_job`]: JobScheduler::stop_job
pub struct JobScheduler {
    registry: JobRegistry,
    jobs: Arc<dyn CronJobRepository>,
    executions: Arc<dyn ExecutionRepository>,
    cycle: Arc<ExecutionCycle>,
    wait_for_running: bool,
    shutdown_grace: Duration,
}

impl JobScheduler {
    pub fn new(
        jobs: Arc<dyn CronJobRepository>,
        executions: Arc<dyn ExecutionRepository>,
        runner: Arc<dyn CommandRunner>,
        config: &ExecutorConfig,
    ) -> Self {
        let cycle = Arc::new(ExecutionCycle::new(executions.clone(), runner, config));
        Self {
            registry: JobRegistry::new(),
            jobs,
            executions,
            cycle,
            wait_for_running: config.wait_for_running,
            shutdown_grace: Duration::from_secs(config.shutdown_grace_seconds),
        }
    }

    /// 加载全部启用的任务并arm
    ///
    /// 单个任务的失败（比如表达式无效）会被记录并跳过，不会中断
    /// 其余任务的初始化。
    pub async fn initialize(&self) -> SchedulerResult<usize> {
        info!("初始化cron调度器...");

        let jobs = self.jobs.find_enabled().await?;
        let mut armed = 0usize;
        for job in jobs {
            match self.schedule_job(&job).await {
                Ok(()) => armed += 1,
                Err(e) => error!("任务 {} (ID: {}) 调度失败: {e}", job.name, job.id),
            }
        }

        info!("调度器初始化完成，共 {armed} 个活跃任务");
        Ok(armed)
    }

    /// arm一个任务
    ///
    /// 表达式无效时会先把失败写入执行历史再返回错误，调用方（API层）
    /// 负责把错误呈现给用户。
    pub async fn schedule_job(&self, job: &CronJob) -> SchedulerResult<()> {
        match self.registry.schedule(job, self.cycle.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.record_schedule_failure(job, &e).await;
                Err(e)
            }
        }
    }

    /// 定义更新后的统一入口：无条件stop，仍启用则用新定义重建
    pub async fn restart_job(&self, job: &CronJob) -> SchedulerResult<()> {
        match self.registry.restart(job, self.cycle.clone()).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.record_schedule_failure(job, &e).await;
                Err(e)
            }
        }
    }

    /// disarm一个任务；从未调度过的id是no-op
    pub async fn stop_job(&self, job_id: i64) {
        self.registry.stop(job_id).await;
    }

    /// 进程关闭：disarm所有定时器
    ///
    /// 默认不等待执行中的命令（参考行为是直接放弃）；配置了
    /// wait_for_running时最多等待shutdown_grace。
    pub async fn shutdown(&self) {
        info!("关闭调度器，停止所有定时器");
        self.registry.stop_all().await;

        if self.wait_for_running {
            let deadline = Instant::now() + self.shutdown_grace;
            while self.cycle.in_flight() > 0 {
                if Instant::now() >= deadline {
                    warn!(
                        "等待执行中任务超时，放弃 {} 个执行",
                        self.cycle.in_flight()
                    );
                    break;
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        } else if self.cycle.in_flight() > 0 {
            warn!("有 {} 个执行仍在进行，按配置直接放弃", self.cycle.in_flight());
        }
    }

    /// 当前执行中的触发总数
    pub fn in_flight(&self) -> usize {
        self.cycle.in_flight()
    }

    pub async fn is_scheduled(&self, job_id: i64) -> bool {
        self.registry.contains(job_id).await
    }

    pub async fn active_job_ids(&self) -> Vec<i64> {
        self.registry.active_job_ids().await
    }

    /// 注册表的只读访问，测试和诊断用
    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    async fn record_schedule_failure(&self, job: &CronJob, err: &SchedulerError) {
        if let SchedulerError::InvalidCron { .. } = err {
            error!(
                "任务 {} 的CRON表达式无效: {}",
                job.name, job.schedule
            );
            if let Err(record_err) = self
                .executions
                .record_execution(
                    job.id,
                    ExecutionStatus::Failed,
                    None,
                    Some(format!("Invalid cron schedule: {}", job.schedule)),
                )
                .await
            {
                error!("写入调度失败记录失败: {record_err}");
            }
        }
    }
}
