use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("任务未找到: {id}")]
    JobNotFound { id: i64 },

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    // 以下两个文案会被原样写入执行记录，不要改动
    #[error("execution timed out")]
    ExecutionTimeout,

    #[error("output exceeded buffer limit")]
    OutputOverflow,

    #[error("命令执行错误: {0}")]
    ProcessExecution(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

impl SchedulerError {
    /// 该错误是否为调度层面的终态错误（重试不会成功）
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SchedulerError::InvalidCron { .. } | SchedulerError::JobNotFound { .. }
        )
    }
}
