//! HTTP 接口层
//!
//! 把请求转换成调度器 / 登记表操作，把内部状态格式化为 JSON

pub mod error;
pub mod health;
pub mod jobs;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

pub use error::ErrorBody;
pub use health::HealthResponse;
pub use jobs::{DownloadAccepted, DownloadRequest};

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/download", post(jobs::create_download))
        .route("/api/jobs", get(jobs::list_jobs))
        .route("/api/jobs/{job_id}", get(jobs::get_job))
        .route("/api/downloads/{job_id}", get(jobs::get_download))
        .route("/api/health", get(health::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
