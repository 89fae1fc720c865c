//! 健康检查
//!
//! 诊断信息获取失败时返回 null，健康检查本身不会失败

use std::io;
use std::path::{Path, PathBuf};

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::models::JobCounts;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub active_jobs: usize,
    pub max_concurrent_jobs: usize,
    pub max_stored_jobs: usize,
    pub jobs: JobCounts,
    pub stored_downloads: usize,
    pub retention_secs: u64,
    pub download_dir: String,
    pub download_dir_bytes: Option<u64>,
    pub browser_version: Option<String>,
}

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let limiter = state.dispatcher.limiter();

    Json(HealthResponse {
        status: "healthy".to_string(),
        active_jobs: limiter.active(),
        max_concurrent_jobs: limiter.limit(),
        max_stored_jobs: state.registry.capacity(),
        jobs: state.registry.counts(),
        stored_downloads: state.store.len(),
        retention_secs: state.config.retention_secs,
        download_dir: state.config.download_dir.display().to_string(),
        download_dir_bytes: dir_size(&state.config.download_dir).await.ok(),
        browser_version: state.driver.version().await,
    })
}

/// 递归统计目录占用的字节数
pub async fn dir_size(root: &Path) -> io::Result<u64> {
    let mut total = 0;
    let mut pending: Vec<PathBuf> = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                pending.push(entry.path());
            } else {
                total += metadata.len();
            }
        }
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dir_size_counts_nested_files() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("job");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(root.path().join("a.bin"), vec![0u8; 10]).unwrap();
        std::fs::write(nested.join("b.pdf"), vec![0u8; 32]).unwrap();

        assert_eq!(dir_size(root.path()).await.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_dir_size_of_missing_dir_is_error() {
        assert!(dir_size(Path::new("/definitely/not/here")).await.is_err());
    }
}
