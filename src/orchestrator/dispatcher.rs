//! 任务调度器 - 编排层
//!
//! 接收新任务：校验 URL → 获取运行名额 → 登记任务 → 后台启动处理器

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::models::Job;
use crate::orchestrator::job_processor::JobProcessor;
use crate::orchestrator::limiter::ConcurrencyLimiter;
use crate::services::{remove_download_files, DownloadStore, JobRegistry};

/// 任务调度器
pub struct Dispatcher {
    allowed_url_prefix: String,
    registry: Arc<JobRegistry>,
    store: Arc<DownloadStore>,
    limiter: ConcurrencyLimiter,
    processor: Arc<JobProcessor>,
}

impl Dispatcher {
    pub fn new(
        allowed_url_prefix: impl Into<String>,
        registry: Arc<JobRegistry>,
        store: Arc<DownloadStore>,
        limiter: ConcurrencyLimiter,
        processor: Arc<JobProcessor>,
    ) -> Self {
        Self {
            allowed_url_prefix: allowed_url_prefix.into(),
            registry,
            store,
            limiter,
            processor,
        }
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// 校验目标 URL 是否在允许范围内
    pub fn validate_url(&self, well_url: &str) -> Result<()> {
        if well_url.is_empty() {
            return Err(AppError::Validation("well_url 不能为空".to_string()));
        }
        if !well_url.starts_with(&self.allowed_url_prefix) {
            return Err(AppError::Validation(format!(
                "URL 必须以 {} 开头: {}",
                self.allowed_url_prefix, well_url
            )));
        }
        Ok(())
    }

    /// 提交新任务，立即返回 queued 状态的任务，下载在后台进行
    pub async fn submit(&self, well_url: &str) -> Result<Job> {
        let well_url = well_url.trim();
        self.validate_url(well_url)?;

        // 先拿名额再登记，名额不足时不会产生任务
        let permit = self.limiter.try_acquire()?;
        let admission = self.registry.create(well_url)?;

        if let Some(evicted) = admission.evicted {
            if let Some(record) = self.store.remove(&evicted.job_id) {
                debug!("删除被淘汰任务 {} 的文件", evicted.job_id);
                remove_download_files(&record).await;
            }
        }

        let job = admission.job;
        info!("[任务 {}] 📥 已接收: {}", job.job_id, job.well_url);

        let processor = Arc::clone(&self.processor);
        tokio::spawn(processor.process(job.job_id.clone(), job.well_url.clone(), permit));

        Ok(job)
    }
}
