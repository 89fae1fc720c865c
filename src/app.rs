use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api;
use crate::browser::ChromiumDriver;
use crate::config::Config;
use crate::state::AppState;
use crate::utils::logging::log_startup;

/// 应用主结构
pub struct App {
    state: AppState,
    janitor: JoinHandle<()>,
}

impl App {
    /// 初始化应用：创建下载目录、构建共享状态、启动清理任务
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        tokio::fs::create_dir_all(&config.download_dir)
            .await
            .with_context(|| format!("创建下载目录失败: {}", config.download_dir.display()))?;

        let driver = Arc::new(ChromiumDriver::new(config.chrome_executable.clone()));
        let state = AppState::new(config, driver);
        let janitor = state.janitor().spawn();

        Ok(Self { state, janitor })
    }

    /// 启动 HTTP 服务，收到 Ctrl+C 后退出
    pub async fn run(self) -> Result<()> {
        let address = self.state.config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("监听 {} 失败", address))?;
        info!("✅ 服务已启动: http://{}", listener.local_addr()?);

        let router = api::create_router(self.state.clone());
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务异常退出")?;

        self.janitor.abort();
        info!("👋 服务已停止");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // 无法监听信号时一直运行
        std::future::pending::<()>().await;
    }
}
