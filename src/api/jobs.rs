//! 任务相关接口：创建、查询、下载

use std::io::ErrorKind;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::models::{Job, JobId, JobStatus};
use crate::services::{remove_download_files, Lookup};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    pub well_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DownloadAccepted {
    pub job_id: JobId,
    pub status: JobStatus,
    pub message: String,
}

/// POST /api/download
pub async fn create_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Result<(StatusCode, Json<DownloadAccepted>)> {
    let job = state.dispatcher.submit(&request.well_url).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DownloadAccepted {
            job_id: job.job_id.clone(),
            status: job.status,
            message: format!(
                "下载任务已创建，请通过 /api/jobs/{} 查询进度",
                job.job_id
            ),
        }),
    ))
}

/// GET /api/jobs
pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<Job>> {
    Json(state.registry.list())
}

/// GET /api/jobs/{job_id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>> {
    let job_id = JobId::from(job_id);
    state
        .registry
        .get(&job_id)
        .map(Json)
        .ok_or(AppError::JobNotFound(job_id))
}

/// GET /api/downloads/{job_id}
///
/// 过期的记录和文件会在本次请求中被删除
pub async fn get_download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Response> {
    let job_id = JobId::from(job_id);

    let record = match state.store.lookup(&job_id, Utc::now()) {
        Lookup::Missing => return Err(AppError::DownloadNotFound(job_id)),
        Lookup::Expired(record) => {
            info!("[任务 {}] 下载已过期，删除文件", job_id);
            remove_download_files(&record).await;
            return Err(AppError::DownloadExpired(job_id));
        }
        Lookup::Ready(record) => record,
    };

    let file = match tokio::fs::File::open(&record.file_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!("[任务 {}] 文件已不存在: {}", job_id, record.file_path.display());
            state.store.remove(&job_id);
            return Err(AppError::DownloadNotFound(job_id));
        }
        Err(e) => return Err(e.into()),
    };
    let length = file.metadata().await?.len();

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        record.filename.replace('"', "")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    let body = Body::from_stream(ReaderStream::new(file));
    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("application/pdf")),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(length)),
        ],
        body,
    )
        .into_response())
}
