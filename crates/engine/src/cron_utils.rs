use chrono::{DateTime, Duration, Utc};
use cron::Schedule;
use std::str::FromStr;

use cronjobd_core::{SchedulerError, SchedulerResult};

/// CRON表达式解析和触发时间计算工具
///
/// 接受标准5字段（分 时 日 月 周）和带秒的6字段表达式，
/// 5字段会在解析前补上秒字段。
#[derive(Debug)]
pub struct CronSchedule {
    expression: String,
    schedule: Schedule,
}

impl CronSchedule {
    /// 解析CRON表达式
    pub fn parse(expression: &str) -> SchedulerResult<Self> {
        let normalized = normalize_expression(expression)?;
        let schedule =
            Schedule::from_str(&normalized).map_err(|e| SchedulerError::InvalidCron {
                expr: expression.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            expression: expression.to_string(),
            schedule,
        })
    }

    /// 校验CRON表达式是否可以被接受
    ///
    /// 纯函数，无副作用。校验失败对该次调度是终态，不应重试。
    pub fn validate(expression: &str) -> bool {
        Self::parse(expression).is_ok()
    }

    /// 任务被armed时使用的原始表达式
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// 获取下一次触发时间
    pub fn next_after(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&from).next()
    }

    /// 计算下次触发距离now的时长
    pub fn time_until_next(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.next_after(now).map(|next| next - now)
    }
}

/// 把5字段表达式补成cron crate要求的6字段，其余字段数直接拒绝
fn normalize_expression(expression: &str) -> SchedulerResult<String> {
    let trimmed = expression.trim();
    let field_count = trimmed.split_whitespace().count();

    match field_count {
        5 => Ok(format!("0 {trimmed}")),
        6 => Ok(trimmed.to_string()),
        _ => Err(SchedulerError::InvalidCron {
            expr: expression.to_string(),
            message: format!("expected 5 or 6 fields, got {field_count}"),
        }),
    }
}
