use std::sync::Arc;

use crate::browser::BrowserDriver;
use crate::config::Config;
use crate::orchestrator::{ConcurrencyLimiter, Dispatcher, JobProcessor, JobTiming};
use crate::services::{DownloadStore, Janitor, JobRegistry};

/// 进程级共享状态
///
/// 启动时构建一次，随进程退出释放
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<JobRegistry>,
    pub store: Arc<DownloadStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub driver: Arc<dyn BrowserDriver>,
}

impl AppState {
    pub fn new(config: Config, driver: Arc<dyn BrowserDriver>) -> Self {
        let registry = Arc::new(JobRegistry::new(config.max_stored_jobs));
        let store = Arc::new(DownloadStore::new());
        let limiter = ConcurrencyLimiter::new(config.max_concurrent_jobs);

        let processor = Arc::new(JobProcessor::new(
            Arc::clone(&driver),
            Arc::clone(&registry),
            Arc::clone(&store),
            config.download_dir.clone(),
            JobTiming::from_config(&config),
        ));

        let dispatcher = Arc::new(Dispatcher::new(
            config.allowed_url_prefix.clone(),
            Arc::clone(&registry),
            Arc::clone(&store),
            limiter,
            processor,
        ));

        Self {
            config: Arc::new(config),
            registry,
            store,
            dispatcher,
            driver,
        }
    }

    /// 创建绑定到本状态下载存储的清理任务
    pub fn janitor(&self) -> Janitor {
        Janitor::new(Arc::clone(&self.store), self.config.janitor_interval())
    }
}
