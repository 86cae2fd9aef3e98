//! 领域仓储抽象
//!
//! 定义数据访问的抽象接口，遵循依赖倒置原则

use async_trait::async_trait;

use cronjobd_core::SchedulerResult;

use crate::entities::{CronJob, CronJobUpdate, ExecutionStatus, JobExecution, NewCronJob};

/// 任务定义仓储抽象
#[async_trait]
pub trait CronJobRepository: Send + Sync {
    async fn create(&self, new_job: &NewCronJob) -> SchedulerResult<CronJob>;
    async fn find_by_id(&self, id: i64) -> SchedulerResult<Option<CronJob>>;
    async fn find_all(&self) -> SchedulerResult<Vec<CronJob>>;
    /// 启动时加载需要调度的任务
    async fn find_enabled(&self) -> SchedulerResult<Vec<CronJob>>;
    async fn update(&self, id: i64, update: &CronJobUpdate) -> SchedulerResult<Option<CronJob>>;
    async fn delete(&self, id: i64) -> SchedulerResult<bool>;
}

/// 执行记录仓储抽象
///
/// 调度器只写不读：`record_execution` 是执行生命周期（开始/完成/失败）
/// 的唯一落盘入口。`started_at` 在写入时取当前时间，终态写入时同时
/// 填充 `completed_at`。
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    async fn record_execution(
        &self,
        cronjob_id: i64,
        status: ExecutionStatus,
        output: Option<String>,
        error_message: Option<String>,
    ) -> SchedulerResult<JobExecution>;

    /// 按开始时间倒序返回某任务的执行历史
    async fn find_by_cronjob_id(
        &self,
        cronjob_id: i64,
        limit: i64,
    ) -> SchedulerResult<Vec<JobExecution>>;
}
