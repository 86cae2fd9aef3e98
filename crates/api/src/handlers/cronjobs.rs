use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use tracing::warn;

use cronjobd_core::SchedulerError;
use cronjobd_domain::{CronJobUpdate, NewCronJob};

use crate::{
    error::{ApiError, ApiResult},
    response::{success, success_empty_with_message, success_with_message},
    routes::AppState,
};

/// 任务创建请求
#[derive(Debug, Deserialize)]
pub struct CreateCronJobRequest {
    pub name: String,
    pub schedule: String,
    pub command: String,
    pub enabled: Option<bool>,
}

/// 任务更新请求
#[derive(Debug, Deserialize)]
pub struct UpdateCronJobRequest {
    pub name: Option<String>,
    pub schedule: Option<String>,
    pub command: Option<String>,
    pub enabled: Option<bool>,
}

/// 执行历史查询参数
#[derive(Debug, Deserialize)]
pub struct ExecutionQueryParams {
    pub limit: Option<i64>,
}

/// 获取任务列表
pub async fn list_cronjobs(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let jobs = state.jobs.find_all().await?;
    Ok(success(jobs))
}

/// 获取单个任务
pub async fn get_cronjob(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let job = state
        .jobs
        .find_by_id(id)
        .await?
        .ok_or(SchedulerError::JobNotFound { id })?;
    Ok(success(job))
}

/// 创建任务
///
/// 定义先落库：表达式无效时任务依然创建成功，只是不会被armed，
/// 调度失败的原因放在响应的message里。
pub async fn create_cronjob(
    State(state): State<AppState>,
    Json(request): Json<CreateCronJobRequest>,
) -> ApiResult<impl IntoResponse> {
    if request.name.trim().is_empty()
        || request.schedule.trim().is_empty()
        || request.command.trim().is_empty()
    {
        return Err(ApiError::BadRequest(
            "name、schedule、command 均不能为空".to_string(),
        ));
    }

    let new_job = NewCronJob {
        name: request.name,
        schedule: request.schedule,
        command: request.command,
        enabled: request.enabled.unwrap_or(true),
    };
    let job = state.jobs.create(&new_job).await?;

    let schedule_note = if job.enabled {
        match state.scheduler.schedule_job(&job).await {
            Ok(()) => None,
            Err(e) => {
                warn!("任务 {} (ID: {}) 创建后调度失败: {e}", job.name, job.id);
                Some(format!("任务已创建但未调度: {e}"))
            }
        }
    } else {
        None
    };

    let body = match schedule_note {
        Some(message) => success_with_message(job, message),
        None => success(job),
    };
    Ok((StatusCode::CREATED, body))
}

/// 更新任务
///
/// 更新落库后统一走restart路径让注册表收敛，覆盖启用/停用切换和
/// 表达式/命令修改。
pub async fn update_cronjob(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateCronJobRequest>,
) -> ApiResult<impl IntoResponse> {
    let update = CronJobUpdate {
        name: request.name,
        schedule: request.schedule,
        command: request.command,
        enabled: request.enabled,
    };
    if update.is_empty() {
        return Err(ApiError::BadRequest("没有可更新的字段".to_string()));
    }

    let job = state
        .jobs
        .update(id, &update)
        .await?
        .ok_or(SchedulerError::JobNotFound { id })?;

    let schedule_note = match state.scheduler.restart_job(&job).await {
        Ok(()) => None,
        Err(e) => {
            warn!("任务 {} (ID: {}) 更新后调度失败: {e}", job.name, job.id);
            Some(format!("任务已更新但未调度: {e}"))
        }
    };

    let body = match schedule_note {
        Some(message) => success_with_message(job, message),
        None => success(job),
    };
    Ok(body)
}

/// 删除任务
pub async fn delete_cronjob(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    // 先disarm再删定义，触发不会撞上已删除的任务
    state.scheduler.stop_job(id).await;

    let deleted = state.jobs.delete(id).await?;
    if !deleted {
        return Err(SchedulerError::JobNotFound { id }.into());
    }
    Ok(success_empty_with_message("任务已删除".to_string()))
}

/// 获取任务的执行历史
pub async fn get_executions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(params): Query<ExecutionQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let limit = params.limit.unwrap_or(50).clamp(1, 500);
    let executions = state.executions.find_by_cronjob_id(id, limit).await?;
    Ok(success(executions))
}
