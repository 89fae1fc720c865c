//! 过期文件清理
//!
//! 定期扫描下载记录，删除过期的文件和记录

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::download_store::{remove_download_files, DownloadStore};

/// 过期文件清理任务
pub struct Janitor {
    store: Arc<DownloadStore>,
    interval: Duration,
}

impl Janitor {
    pub fn new(store: Arc<DownloadStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// 执行一轮清理，返回删除的记录数
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let expired = self.store.take_expired(now);
        for record in &expired {
            remove_download_files(record).await;
        }
        expired.len()
    }

    /// 在后台按固定间隔运行，直到进程退出
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!("🧹 清理任务已启动，间隔 {} 秒", self.interval.as_secs());

            loop {
                ticker.tick().await;
                let removed = self.sweep(Utc::now()).await;
                if removed > 0 {
                    info!("🧹 已清理 {} 个过期下载", removed);
                } else {
                    debug!("清理完成: 没有过期下载");
                }
            }
        })
    }
}
