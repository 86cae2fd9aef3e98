use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use cronjobd_domain::{CronJobRepository, ExecutionRepository};
use cronjobd_engine::JobScheduler;

use crate::handlers::{
    cronjobs::{
        create_cronjob, delete_cronjob, get_cronjob, get_executions, list_cronjobs,
        update_cronjob,
    },
    health::health_check,
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn CronJobRepository>,
    pub executions: Arc<dyn ExecutionRepository>,
    pub scheduler: Arc<JobScheduler>,
}

/// 创建API路由
pub fn create_routes(state: AppState, cors_enabled: bool) -> Router {
    let router = Router::new()
        // 健康检查
        .route("/health", get(health_check))
        // 任务管理API
        .route("/api/cronjobs", get(list_cronjobs).post(create_cronjob))
        .route("/api/cronjobs/{id}", get(get_cronjob))
        .route("/api/cronjobs/{id}/update", post(update_cronjob))
        .route("/api/cronjobs/{id}/delete", post(delete_cronjob))
        .route("/api/cronjobs/{id}/executions", get(get_executions))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors_enabled {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
