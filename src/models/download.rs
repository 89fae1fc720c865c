//! 下载记录模型

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use super::job::JobId;

/// 已完成任务的可下载文件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadRecord {
    pub job_id: JobId,
    /// 文件绝对路径
    pub file_path: PathBuf,
    pub filename: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl DownloadRecord {
    pub fn new(job_id: JobId, file_path: PathBuf, created_at: DateTime<Utc>, retention: Duration) -> Self {
        let filename = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}.pdf", job_id));

        Self {
            job_id,
            file_path,
            filename,
            created_at,
            expires_at: created_at + retention,
        }
    }

    /// `now` 达到或超过过期时间即视为过期
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiration_boundary() {
        let now = Utc::now();
        let record = DownloadRecord::new(
            JobId::new(),
            PathBuf::from("/tmp/job/report.pdf"),
            now,
            Duration::hours(1),
        );

        assert_eq!(record.filename, "report.pdf");
        assert!(!record.is_expired(now));
        assert!(!record.is_expired(now + Duration::minutes(59)));
        assert!(record.is_expired(now + Duration::hours(1)));
    }
}
