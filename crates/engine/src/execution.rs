use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use cronjobd_core::ExecutorConfig;
use cronjobd_domain::{CronJob, ExecutionRepository, ExecutionStatus};

use crate::runner::{CommandRunner, ExecutionLimits};

/// 触发重叠被跳过时写入执行记录的文案
pub const SKIPPED_MESSAGE: &str = "skipped: previous run still in progress";

/// 命令成功但stdout和stderr都为空时写入的占位输出
pub const SUCCESS_SENTINEL: &str = "Command executed successfully";

/// 单次触发的执行周期
///
/// 状态流转: triggered → recording_start → running_process →
/// recording_result → idle。任何错误只终结本次触发，绝不会传播到
/// 定时器任务之外。
pub struct ExecutionCycle {
    executions: Arc<dyn ExecutionRepository>,
    runner: Arc<dyn CommandRunner>,
    limits: ExecutionLimits,
    skip_if_running: bool,
    /// 全局执行中计数，关闭时等待用
    in_flight: AtomicUsize,
}

impl ExecutionCycle {
    pub fn new(
        executions: Arc<dyn ExecutionRepository>,
        runner: Arc<dyn CommandRunner>,
        config: &ExecutorConfig,
    ) -> Self {
        Self {
            executions,
            runner,
            limits: ExecutionLimits::from(config),
            skip_if_running: config.skip_if_running,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// 当前执行中的触发总数（跨所有任务）
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// 驱动一次完整的触发周期
    ///
    /// `job_in_flight` 是该任务自己的执行中计数。默认策略允许同一任务
    /// 的触发自我重叠（保留参考行为）；开启 `skip_if_running` 后，
    /// 上一次执行未结束时本次触发会被跳过，并通过同一条记录路径写入
    /// 一条失败记录，保证跳过可被观测。
    pub async fn execute(&self, job: &CronJob, job_in_flight: &AtomicUsize) {
        if self.skip_if_running && job_in_flight.load(Ordering::SeqCst) > 0 {
            warn!(
                "任务 {} (ID: {}) 上一次执行未结束，跳过本次触发",
                job.name, job.id
            );
            if let Err(e) = self
                .executions
                .record_execution(
                    job.id,
                    ExecutionStatus::Failed,
                    None,
                    Some(SKIPPED_MESSAGE.to_string()),
                )
                .await
            {
                error!("记录被跳过的触发失败: {e}");
            }
            return;
        }

        job_in_flight.fetch_add(1, Ordering::SeqCst);
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        self.run_once(job).await;

        job_in_flight.fetch_sub(1, Ordering::SeqCst);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    async fn run_once(&self, job: &CronJob) {
        info!("执行任务: {} (ID: {})", job.name, job.id);

        // recording_start: 先落一条running记录
        if let Err(e) = self
            .executions
            .record_execution(job.id, ExecutionStatus::Running, None, None)
            .await
        {
            error!("写入执行开始记录失败，放弃本次触发: {e}");
            return;
        }

        // running_process → recording_result
        match self.runner.run(&job.command, &self.limits).await {
            Ok(output) if output.success => {
                let text = if !output.stdout.is_empty() {
                    output.stdout
                } else if !output.stderr.is_empty() {
                    output.stderr
                } else {
                    SUCCESS_SENTINEL.to_string()
                };
                self.record_result(job, ExecutionStatus::Completed, Some(text), None)
                    .await;
                info!("任务 {} 执行成功", job.name);
            }
            Ok(output) => {
                let reason = if !output.stderr.is_empty() {
                    output.stderr
                } else {
                    format!("命令执行失败，退出码: {:?}", output.exit_code)
                };
                self.record_result(job, ExecutionStatus::Failed, None, Some(reason.clone()))
                    .await;
                warn!("任务 {} 执行失败: {reason}", job.name);
            }
            Err(e) => {
                let reason = e.to_string();
                self.record_result(job, ExecutionStatus::Failed, None, Some(reason.clone()))
                    .await;
                warn!("任务 {} 执行失败: {reason}", job.name);
            }
        }
    }

    async fn record_result(
        &self,
        job: &CronJob,
        status: ExecutionStatus,
        output: Option<String>,
        error_message: Option<String>,
    ) {
        if let Err(e) = self
            .executions
            .record_execution(job.id, status, output, error_message)
            .await
        {
            // 记录失败不能让调度进程崩溃，也不能把任务从注册表中摘除
            error!("任务 {} (ID: {}) 写入执行结果失败: {e}", job.name, job.id);
        }
    }
}
