use std::process::Stdio;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

use cronjobd_core::{ExecutorConfig, SchedulerError, SchedulerResult};

/// 单次执行的资源上限
#[derive(Debug, Clone)]
pub struct ExecutionLimits {
    /// 墙钟时间上限
    pub timeout: Duration,
    /// stdout+stderr合计捕获上限
    pub max_output_bytes: u64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            max_output_bytes: 10 * 1024 * 1024,
        }
    }
}

impl From<&ExecutorConfig> for ExecutionLimits {
    fn from(config: &ExecutorConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.timeout_seconds),
            max_output_bytes: config.max_output_bytes,
        }
    }
}

/// 进程执行结果
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// 操作系统层面的"带上限执行shell命令"抽象
///
/// 超出任一上限时进程会被强制终止，分别返回
/// [`SchedulerError::ExecutionTimeout`] 和 [`SchedulerError::OutputOverflow`]。
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, limits: &ExecutionLimits)
        -> SchedulerResult<CommandOutput>;
}

/// 通过 `sh -c` 运行命令的默认执行器
#[derive(Debug, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(
        &self,
        command: &str,
        limits: &ExecutionLimits,
    ) -> SchedulerResult<CommandOutput> {
        debug!("执行命令: {command}");

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SchedulerError::ProcessExecution(format!("启动命令失败: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SchedulerError::Internal("无法获取stdout".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SchedulerError::Internal("无法获取stderr".to_string()))?;

        // stdout和stderr共享同一份字节预算
        let budget = Arc::new(AtomicI64::new(limits.max_output_bytes as i64));
        let (overflow_tx, mut overflow_rx) = mpsc::channel::<()>(2);
        let stdout_task = tokio::spawn(read_capped(stdout, budget.clone(), overflow_tx.clone()));
        let stderr_task = tokio::spawn(read_capped(stderr, budget, overflow_tx));

        let exit_status = tokio::select! {
            res = timeout(limits.timeout, child.wait()) => match res {
                Ok(Ok(status)) => status,
                Ok(Err(e)) => {
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(SchedulerError::ProcessExecution(format!(
                        "等待进程结束失败: {e}"
                    )));
                }
                Err(_) => {
                    warn!("命令超出时间上限，强制终止: {command}");
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    stdout_task.abort();
                    stderr_task.abort();
                    return Err(SchedulerError::ExecutionTimeout);
                }
            },
            Some(_) = overflow_rx.recv() => {
                warn!("命令输出超出缓冲上限，强制终止: {command}");
                let _ = child.start_kill();
                let _ = child.wait().await;
                stdout_task.abort();
                stderr_task.abort();
                return Err(SchedulerError::OutputOverflow);
            }
        };

        let stdout_capture = stdout_task.await.unwrap_or_default();
        let stderr_capture = stderr_task.await.unwrap_or_default();

        // 进程退出后残留在管道里的数据也可能触顶
        if stdout_capture.overflowed || stderr_capture.overflowed {
            return Err(SchedulerError::OutputOverflow);
        }

        Ok(CommandOutput {
            success: exit_status.success(),
            exit_code: exit_status.code(),
            stdout: String::from_utf8_lossy(&stdout_capture.data).into_owned(),
            stderr: String::from_utf8_lossy(&stderr_capture.data).into_owned(),
        })
    }
}

#[derive(Debug, Default)]
struct Capture {
    data: Vec<u8>,
    overflowed: bool,
}

/// 读取单个输出流，扣减共享预算，触顶时发出溢出信号并停止读取
async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    budget: Arc<AtomicI64>,
    overflow_tx: mpsc::Sender<()>,
) -> Capture {
    let mut data = Vec::new();
    let mut chunk = [0u8; 8192];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let remaining = budget.fetch_sub(n as i64, Ordering::SeqCst) - n as i64;
                if remaining < 0 {
                    let _ = overflow_tx.try_send(());
                    return Capture {
                        data,
                        overflowed: true,
                    };
                }
                data.extend_from_slice(&chunk[..n]);
            }
            Err(_) => break,
        }
    }

    Capture {
        data,
        overflowed: false,
    }
}
