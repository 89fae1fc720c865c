//! 下载记录存储
//!
//! 内存中保存已完成任务的文件位置和过期时间

use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::{DownloadRecord, JobId};

/// 查询下载记录的结果
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Missing,
    /// 已过期，记录已从存储中移除
    Expired(DownloadRecord),
    Ready(DownloadRecord),
}

/// 下载记录存储
#[derive(Default)]
pub struct DownloadStore {
    records: Mutex<HashMap<JobId, DownloadRecord>>,
}

impl DownloadStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, DownloadRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 写入记录，同一任务只保留一条
    pub fn insert(&self, record: DownloadRecord) {
        self.lock().insert(record.job_id.clone(), record);
    }

    pub fn get(&self, id: &JobId) -> Option<DownloadRecord> {
        self.lock().get(id).cloned()
    }

    /// 查询记录，过期的记录会被顺带移除
    pub fn lookup(&self, id: &JobId, now: DateTime<Utc>) -> Lookup {
        let mut records = self.lock();
        match records.get(id).map(|r| r.is_expired(now)) {
            None => Lookup::Missing,
            Some(true) => records.remove(id).map_or(Lookup::Missing, Lookup::Expired),
            Some(false) => records.get(id).cloned().map_or(Lookup::Missing, Lookup::Ready),
        }
    }

    pub fn remove(&self, id: &JobId) -> Option<DownloadRecord> {
        self.lock().remove(id)
    }

    /// 取出所有已过期的记录
    pub fn take_expired(&self, now: DateTime<Utc>) -> Vec<DownloadRecord> {
        let mut records = self.lock();
        let expired: Vec<JobId> = records
            .values()
            .filter(|r| r.is_expired(now))
            .map(|r| r.job_id.clone())
            .collect();
        expired
            .iter()
            .filter_map(|id| records.remove(id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 删除记录对应的文件，目录为空时一并删除
///
/// 尽力而为，失败只记录日志
pub async fn remove_download_files(record: &DownloadRecord) {
    match tokio::fs::remove_file(&record.file_path).await {
        Ok(()) => debug!("🗑️ 已删除文件: {}", record.file_path.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("删除文件 {} 失败: {}", record.file_path.display(), e),
    }

    if let Some(dir) = record.file_path.parent() {
        remove_dir_if_empty(dir).await;
    }
}

/// 目录为空时删除，非空或不存在时什么也不做
pub async fn remove_dir_if_empty(dir: &std::path::Path) {
    if let Err(e) = tokio::fs::remove_dir(dir).await {
        debug!("保留目录 {}: {}", dir.display(), e);
    }
}
