//! 引擎测试共用的内存仓储和mock

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use mockall::mock;

use cronjobd_core::{SchedulerError, SchedulerResult};
use cronjobd_domain::{
    CronJob, CronJobRepository, CronJobUpdate, ExecutionRepository, ExecutionStatus, JobExecution,
    NewCronJob,
};

use crate::runner::{CommandOutput, CommandRunner, ExecutionLimits};

mock! {
    pub Runner {}

    #[async_trait]
    impl CommandRunner for Runner {
        async fn run(
            &self,
            command: &str,
            limits: &ExecutionLimits,
        ) -> SchedulerResult<CommandOutput>;
    }
}

/// 固定延迟后成功返回的执行器，重叠/关闭等待场景用
pub struct SlowRunner {
    delay: std::time::Duration,
}

impl SlowRunner {
    pub fn new(delay: std::time::Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl CommandRunner for SlowRunner {
    async fn run(
        &self,
        _command: &str,
        _limits: &ExecutionLimits,
    ) -> SchedulerResult<CommandOutput> {
        tokio::time::sleep(self.delay).await;
        Ok(CommandOutput {
            success: true,
            exit_code: Some(0),
            stdout: "slow\n".to_string(),
            stderr: String::new(),
        })
    }
}

/// 测试用的内存任务定义仓储
#[derive(Default)]
pub struct InMemoryCronJobRepository {
    jobs: Mutex<HashMap<i64, CronJob>>,
    next_id: Mutex<i64>,
}

impl InMemoryCronJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(jobs: Vec<CronJob>) -> Self {
        let repo = Self::new();
        {
            let mut map = repo.jobs.lock().unwrap();
            let mut next_id = repo.next_id.lock().unwrap();
            for job in jobs {
                *next_id = (*next_id).max(job.id);
                map.insert(job.id, job);
            }
        }
        repo
    }
}

#[async_trait]
impl CronJobRepository for InMemoryCronJobRepository {
    async fn create(&self, new_job: &NewCronJob) -> SchedulerResult<CronJob> {
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let now = Utc::now();
        let job = CronJob {
            id: *next_id,
            name: new_job.name.clone(),
            schedule: new_job.schedule.clone(),
            command: new_job.command.clone(),
            enabled: new_job.enabled,
            created_at: now,
            updated_at: now,
        };
        self.jobs.lock().unwrap().insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: i64) -> SchedulerResult<Option<CronJob>> {
        Ok(self.jobs.lock().unwrap().get(&id).cloned())
    }

    async fn find_all(&self) -> SchedulerResult<Vec<CronJob>> {
        let mut jobs: Vec<CronJob> = self.jobs.lock().unwrap().values().cloned().collect();
        jobs.sort_by_key(|j| j.id);
        Ok(jobs)
    }

    async fn find_enabled(&self) -> SchedulerResult<Vec<CronJob>> {
        let mut jobs: Vec<CronJob> = self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.enabled)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| j.id);
        Ok(jobs)
    }

    async fn update(&self, id: i64, update: &CronJobUpdate) -> SchedulerResult<Option<CronJob>> {
        let mut jobs = self.jobs.lock().unwrap();
        let Some(job) = jobs.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = &update.name {
            job.name = name.clone();
        }
        if let Some(schedule) = &update.schedule {
            job.schedule = schedule.clone();
        }
        if let Some(command) = &update.command {
            job.command = command.clone();
        }
        if let Some(enabled) = update.enabled {
            job.enabled = enabled;
        }
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn delete(&self, id: i64) -> SchedulerResult<bool> {
        Ok(self.jobs.lock().unwrap().remove(&id).is_some())
    }
}

/// 测试用的内存执行记录仓储
///
/// `set_fail_writes` 可以模拟持久化边界失败。
#[derive(Default)]
pub struct InMemoryExecutionRepository {
    records: Mutex<Vec<JobExecution>>,
    next_id: Mutex<i64>,
    fail_writes: AtomicBool,
}

impl InMemoryExecutionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn records(&self) -> Vec<JobExecution> {
        self.records.lock().unwrap().clone()
    }

    pub fn records_for(&self, cronjob_id: i64) -> Vec<JobExecution> {
        self.records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.cronjob_id == cronjob_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryExecutionRepository {
    async fn record_execution(
        &self,
        cronjob_id: i64,
        status: ExecutionStatus,
        output: Option<String>,
        error_message: Option<String>,
    ) -> SchedulerResult<JobExecution> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SchedulerError::Internal("写入失败（测试注入）".to_string()));
        }
        let mut next_id = self.next_id.lock().unwrap();
        *next_id += 1;
        let now = Utc::now();
        let record = JobExecution {
            id: *next_id,
            cronjob_id,
            status,
            output,
            error_message,
            started_at: now,
            completed_at: status.is_terminal().then_some(now),
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn find_by_cronjob_id(
        &self,
        cronjob_id: i64,
        limit: i64,
    ) -> SchedulerResult<Vec<JobExecution>> {
        let mut records = self.records_for(cronjob_id);
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records.truncate(limit as usize);
        Ok(records)
    }
}

/// 构造测试任务定义
pub struct CronJobBuilder {
    job: CronJob,
}

impl CronJobBuilder {
    pub fn new(id: i64) -> Self {
        let now = Utc::now();
        Self {
            job: CronJob {
                id,
                name: format!("job-{id}"),
                schedule: "* * * * *".to_string(),
                command: "echo hi".to_string(),
                enabled: true,
                created_at: now,
                updated_at: now,
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.job.name = name.to_string();
        self
    }

    pub fn schedule(mut self, schedule: &str) -> Self {
        self.job.schedule = schedule.to_string();
        self
    }

    pub fn command(mut self, command: &str) -> Self {
        self.job.command = command.to_string();
        self
    }

    pub fn disabled(mut self) -> Self {
        self.job.enabled = false;
        self
    }

    pub fn build(self) -> CronJob {
        self.job
    }
}
