use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use cronjobd_core::SchedulerError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度器错误: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("未找到资源")]
    NotFound,

    #[error("请求参数错误: {0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Scheduler(SchedulerError::InvalidCron { expr, message }) => (
                StatusCode::BAD_REQUEST,
                format!("无效的CRON表达式: {expr} - {message}"),
            ),
            ApiError::Scheduler(SchedulerError::JobNotFound { id }) => {
                (StatusCode::NOT_FOUND, format!("任务 ID {id} 不存在"))
            }
            ApiError::Scheduler(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::NotFound => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = Json(json!({
            "success": false,
            "data": null,
            "message": message,
            "timestamp": chrono::Utc::now(),
        }));

        (status, body).into_response()
    }
}
