//! 单个任务处理器 - 编排层
//!
//! ## 职责
//!
//! 驱动一次浏览器会话，从目标页面拿到 PDF：
//!
//! 1. **标记状态**：queued → downloading
//! 2. **启动会话**：任务专属下载目录
//! 3. **打开页面**：导航并等待页面加载完成
//! 4. **定位按钮**：按优先级依次尝试定位规则
//! 5. **点击下载**：滚动、停顿、点击、等待落盘
//! 6. **收集文件**：登记下载记录，标记 completed 或 failed
//!
//! 无论哪条路径退出，浏览器会话都会被关闭，运行名额都会归还

use std::any::Any;
use std::io::{self, ErrorKind};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::Utc;
use futures::FutureExt;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::browser::{BrowserDriver, BrowserSession, LaunchOptions};
use crate::config::Config;
use crate::error::{AppError, BrowserError};
use crate::models::{DownloadRecord, FoundControl, JobId, DOWNLOAD_CONTROL_PATTERNS};
use crate::orchestrator::limiter::JobPermit;
use crate::services::{remove_download_files, DownloadStore, JobRegistry};
use crate::utils::truncate_text;

/// 轮询页面加载状态的间隔
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// 任务各阶段的固定等待时间
#[derive(Debug, Clone)]
pub struct JobTiming {
    pub page_ready_timeout: Duration,
    pub ready_poll_interval: Duration,
    pub click_pause: Duration,
    pub post_click_wait: Duration,
    pub retention: chrono::Duration,
}

impl JobTiming {
    pub fn from_config(config: &Config) -> Self {
        Self {
            page_ready_timeout: config.page_ready_timeout(),
            ready_poll_interval: READY_POLL_INTERVAL,
            click_pause: config.click_pause(),
            post_click_wait: config.post_click_wait(),
            retention: config.retention(),
        }
    }
}

/// 一次任务运行的结果
#[derive(Debug)]
pub enum JobOutcome {
    /// 拿到了 PDF 文件
    Downloaded(PathBuf),
    /// 页面上没有找到下载按钮
    NoControl,
    /// 点击后没有出现 PDF 文件
    NoPdf(FoundControl),
    /// 运行过程中出错
    Error(String),
}

impl JobOutcome {
    fn failure_message(&self) -> Option<String> {
        match self {
            JobOutcome::Downloaded(_) => None,
            JobOutcome::NoControl => Some("页面上未找到下载按钮 (no download control found on page)".to_string()),
            JobOutcome::NoPdf(control) => Some(format!(
                "点击 [{}] 后未出现 PDF 文件 (no PDF file appeared after clicking)",
                control.pattern
            )),
            JobOutcome::Error(message) => Some(message.clone()),
        }
    }
}

/// 单个任务处理器
pub struct JobProcessor {
    driver: Arc<dyn BrowserDriver>,
    registry: Arc<JobRegistry>,
    store: Arc<DownloadStore>,
    download_root: PathBuf,
    profile_root: PathBuf,
    timing: JobTiming,
}

impl JobProcessor {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        registry: Arc<JobRegistry>,
        store: Arc<DownloadStore>,
        download_root: PathBuf,
        timing: JobTiming,
    ) -> Self {
        Self {
            driver,
            registry,
            store,
            download_root,
            profile_root: std::env::temp_dir().join("well-pdf-profiles"),
            timing,
        }
    }

    /// 任务专属下载目录
    pub fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.download_root.join(job_id.as_str())
    }

    /// 处理一个任务，直到 completed 或 failed
    ///
    /// 名额在函数返回（或任务崩溃）时归还
    pub async fn process(self: Arc<Self>, job_id: JobId, well_url: String, permit: JobPermit) {
        let _permit = permit;

        if let Err(e) = self.registry.mark_downloading(&job_id) {
            warn!("[任务 {}] 无法开始处理: {}", job_id, e);
            return;
        }
        info!("[任务 {}] ⬇️ 开始处理: {}", job_id, well_url);

        let job_dir = self.job_dir(&job_id);
        let worker = Arc::clone(&self);
        let (id, dir) = (job_id.clone(), job_dir.clone());
        let handle = tokio::spawn(async move { worker.run(&id, &well_url, &dir).await });

        let outcome = match handle.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => JobOutcome::Error(e.to_string()),
            Err(e) => JobOutcome::Error(format!("任务异常终止: {}", e)),
        };

        self.finish(&job_id, &job_dir, outcome).await;
    }

    async fn run(&self, job_id: &JobId, url: &str, job_dir: &Path) -> Result<JobOutcome, AppError> {
        tokio::fs::create_dir_all(job_dir).await?;
        let download_dir = tokio::fs::canonicalize(job_dir).await?;
        let profile_dir = self.profile_root.join(job_id.as_str());

        let mut session = self
            .driver
            .launch(LaunchOptions::new(download_dir.clone(), profile_dir))
            .await?;

        // 会话留在 catch_unwind 之外，drive 崩溃时也能正常关闭
        let result = AssertUnwindSafe(self.drive(job_id, session.as_mut(), url, &download_dir))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| {
                Ok(JobOutcome::Error(format!(
                    "任务异常终止: {}",
                    panic_message(panic.as_ref())
                )))
            });
        session.terminate().await;
        debug!("[任务 {}] 浏览器会话已结束", job_id);

        result
    }

    async fn drive(
        &self,
        job_id: &JobId,
        session: &mut dyn BrowserSession,
        url: &str,
        download_dir: &Path,
    ) -> Result<JobOutcome, AppError> {
        session.navigate(url).await?;
        self.wait_until_ready(session).await?;
        debug!("[任务 {}] 页面加载完成", job_id);

        let Some(control) = locate_control(session).await? else {
            warn!("[任务 {}] ⚠️ 页面上未找到下载按钮", job_id);
            return Ok(JobOutcome::NoControl);
        };
        info!(
            "[任务 {}] 🔍 通过 [{}] 找到 {} 个候选，使用第一个: {:?}",
            job_id,
            control.pattern,
            control.match_count,
            truncate_text(&control.text, 60)
        );

        session.scroll_into_view(&control).await?;
        sleep(self.timing.click_pause).await;
        session.click(&control).await?;
        info!(
            "[任务 {}] 🖱️ 已点击，等待 {} 秒下载落盘...",
            job_id,
            self.timing.post_click_wait.as_secs()
        );
        sleep(self.timing.post_click_wait).await;

        Ok(match find_downloaded_pdf(download_dir).await? {
            Some(path) => JobOutcome::Downloaded(path),
            None => JobOutcome::NoPdf(control),
        })
    }

    async fn wait_until_ready(&self, session: &mut dyn BrowserSession) -> Result<(), BrowserError> {
        let poll = self.timing.ready_poll_interval;
        let waited = timeout(self.timing.page_ready_timeout, async {
            loop {
                match session.is_ready().await {
                    Ok(true) => return,
                    Ok(false) => {}
                    Err(e) => debug!("检查页面状态失败: {}", e),
                }
                sleep(poll).await;
            }
        })
        .await;

        waited.map_err(|_| {
            BrowserError::Timeout(format!(
                "页面在 {} 秒内未加载完成 (page did not become ready)",
                self.timing.page_ready_timeout.as_secs()
            ))
        })
    }

    async fn finish(&self, job_id: &JobId, job_dir: &Path, outcome: JobOutcome) {
        let message = match outcome {
            JobOutcome::Downloaded(path) => return self.complete(job_id, path).await,
            failed => failed
                .failure_message()
                .unwrap_or_else(|| "未知错误".to_string()),
        };

        match self.registry.mark_failed(job_id, message.clone()) {
            Ok(_) => error!("[任务 {}] ❌ 处理失败: {}", job_id, message),
            Err(e) => error!("[任务 {}] 无法标记失败: {}", job_id, e),
        }

        if let Err(e) = tokio::fs::remove_dir_all(job_dir).await {
            debug!("[任务 {}] 清理目录失败: {}", job_id, e);
        }
    }

    /// 先标记 completed 再写入下载记录
    ///
    /// 两步之间下载接口会短暂返回 404，但不会出现未完成任务的下载记录
    async fn complete(&self, job_id: &JobId, path: PathBuf) {
        let record = DownloadRecord::new(job_id.clone(), path, Utc::now(), self.timing.retention);

        match self.registry.mark_completed(job_id, record.filename.clone()) {
            Ok(_) => {
                self.store.insert(record.clone());
                info!("[任务 {}] ✅ 下载完成: {}", job_id, record.filename);
            }
            Err(e) => {
                error!("[任务 {}] 无法标记完成: {}", job_id, e);
                remove_download_files(&record).await;
            }
        }
    }
}

/// 按优先级尝试定位规则，第一个有匹配的规则胜出
pub async fn locate_control(
    session: &mut dyn BrowserSession,
) -> Result<Option<FoundControl>, BrowserError> {
    for pattern in DOWNLOAD_CONTROL_PATTERNS.iter() {
        if let Some(control) = session.find(pattern).await? {
            return Ok(Some(control));
        }
        debug!("规则 [{}] 无匹配", pattern);
    }
    Ok(None)
}

/// 在下载目录中查找 PDF
///
/// 多个文件时取修改时间最新的，时间相同按文件名排序
pub async fn find_downloaded_pdf(dir: &Path) -> io::Result<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut candidates: Vec<(SystemTime, PathBuf)> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_pdf(&path) {
            continue;
        }
        // Chrome 重命名 .crdownload 时文件可能刚好消失
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if !metadata.is_file() {
            continue;
        }
        let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        candidates.push((modified, path));
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
    Ok(candidates.into_iter().next().map(|(_, path)| path))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "未知 panic".to_string())
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}
