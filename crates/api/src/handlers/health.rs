use axum::{extract::State, response::IntoResponse};
use serde_json::json;

use crate::{response::success, routes::AppState};

/// 健康检查
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let active_jobs = state.scheduler.active_job_ids().await.len();
    success(json!({
        "status": "healthy",
        "active_jobs": active_jobs,
    }))
}
