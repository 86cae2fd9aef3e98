use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use cronjobd_core::SchedulerResult;
use cronjobd_domain::CronJob;

use crate::cron_utils::CronSchedule;
use crate::execution::ExecutionCycle;

/// 注册表中的一个armed任务
///
/// 定时器句柄归任务独占，disarm时abort释放。
struct ScheduledTask {
    cron_expression: String,
    handle: JoinHandle<()>,
    in_flight: Arc<AtomicUsize>,
}

/// 活跃任务注册表
///
/// job_id到定时器句柄的内存映射，是"当前调度了什么"的唯一事实来源。
/// 每个job_id至多一个条目；所有变更都经过同一把map级别的锁，
/// 同一job_id的stop/schedule因此不会交错，restart不会泄漏定时器。
pub struct JobRegistry {
    tasks: Mutex<HashMap<i64, ScheduledTask>>,
    armed_timers: AtomicUsize,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            armed_timers: AtomicUsize::new(0),
        }
    }

    /// arm一个任务
    ///
    /// 表达式校验失败时不做任何变更直接返回错误（失败的记录由调用方
    /// 负责）。同id已存在的任务会先被停掉再替换（幂等替换），armed的
    /// 任务永远不会被原地修改。
    pub async fn schedule(&self, job: &CronJob, cycle: Arc<ExecutionCycle>) -> SchedulerResult<()> {
        let schedule = CronSchedule::parse(&job.schedule)?;
        let mut tasks = self.tasks.lock().await;
        self.arm_locked(&mut tasks, job, schedule, cycle);
        Ok(())
    }

    /// disarm一个任务；任务不存在时是no-op而不是错误
    pub async fn stop(&self, job_id: i64) {
        let mut tasks = self.tasks.lock().await;
        self.disarm_locked(&mut tasks, job_id);
    }

    /// stop后按新定义重建，仅当任务仍启用时重新arm
    ///
    /// 这是响应定义更新的唯一路径：替换重建而非原地修改，执行中的
    /// 触发不可能观察到半更新的命令串。
    pub async fn restart(&self, job: &CronJob, cycle: Arc<ExecutionCycle>) -> SchedulerResult<()> {
        // stop和schedule在同一次锁持有内完成
        let mut tasks = self.tasks.lock().await;
        if !job.enabled {
            self.disarm_locked(&mut tasks, job.id);
            return Ok(());
        }
        let schedule = CronSchedule::parse(&job.schedule)?;
        self.arm_locked(&mut tasks, job, schedule, cycle);
        Ok(())
    }

    /// disarm全部任务，仅在进程关闭时使用
    pub async fn stop_all(&self) {
        let mut tasks = self.tasks.lock().await;
        for (job_id, task) in tasks.drain() {
            task.handle.abort();
            self.armed_timers.fetch_sub(1, Ordering::SeqCst);
            info!("已停止任务 ID: {job_id}");
        }
    }

    pub async fn contains(&self, job_id: i64) -> bool {
        self.tasks.lock().await.contains_key(&job_id)
    }

    pub async fn active_job_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.tasks.lock().await.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// 某任务armed时使用的表达式（可能落后于持久化的值，直到restart）
    pub async fn armed_expression(&self, job_id: i64) -> Option<String> {
        self.tasks
            .lock()
            .await
            .get(&job_id)
            .map(|t| t.cron_expression.clone())
    }

    /// 某任务当前执行中的触发数
    pub async fn running_count(&self, job_id: i64) -> Option<usize> {
        self.tasks
            .lock()
            .await
            .get(&job_id)
            .map(|t| t.in_flight.load(Ordering::SeqCst))
    }

    pub async fn len(&self) -> usize {
        self.tasks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.lock().await.is_empty()
    }

    /// 当前持有的定时器资源数，用于断言没有泄漏
    pub fn armed_timers(&self) -> usize {
        self.armed_timers.load(Ordering::SeqCst)
    }

    fn arm_locked(
        &self,
        tasks: &mut HashMap<i64, ScheduledTask>,
        job: &CronJob,
        schedule: CronSchedule,
        cycle: Arc<ExecutionCycle>,
    ) {
        if let Some(existing) = tasks.remove(&job.id) {
            existing.handle.abort();
            self.armed_timers.fetch_sub(1, Ordering::SeqCst);
            debug!("替换已调度的任务 ID: {}", job.id);
        }

        let in_flight = Arc::new(AtomicUsize::new(0));
        let handle = spawn_timer(job.clone(), schedule, cycle, in_flight.clone());
        self.armed_timers.fetch_add(1, Ordering::SeqCst);

        tasks.insert(
            job.id,
            ScheduledTask {
                cron_expression: job.schedule.clone(),
                handle,
                in_flight,
            },
        );
        info!(
            "已调度任务: {} (ID: {}), 表达式: {}",
            job.name, job.id, job.schedule
        );
    }

    fn disarm_locked(&self, tasks: &mut HashMap<i64, ScheduledTask>, job_id: i64) {
        if let Some(task) = tasks.remove(&job_id) {
            task.handle.abort();
            self.armed_timers.fetch_sub(1, Ordering::SeqCst);
            info!("已停止任务 ID: {job_id}");
        }
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// 每个armed任务一个定时器循环，触发时把执行周期作为独立任务派发，
/// 因此慢任务不会阻塞自己的定时器，也不会阻塞其他任务
fn spawn_timer(
    job: CronJob,
    schedule: CronSchedule,
    cycle: Arc<ExecutionCycle>,
    in_flight: Arc<AtomicUsize>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut last_fire = Utc::now();
        loop {
            // 基准取max(上次触发点, 当前时间)：既不会把同一触发点触发两次，
            // 也不会在延迟后回放错过的触发
            let base = last_fire.max(Utc::now());
            let Some(next) = schedule.next_after(base) else {
                warn!(
                    "任务 {} (ID: {}) 不会再有触发时间，定时器退出",
                    job.name, job.id
                );
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            let cycle = cycle.clone();
            let job_snapshot = job.clone();
            let in_flight = in_flight.clone();
            tokio::spawn(async move {
                cycle.execute(&job_snapshot, &in_flight).await;
            });

            last_fire = next;
        }
    })
}
