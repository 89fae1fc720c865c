use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
use futures::StreamExt;
use serde_json::json;
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use super::{BrowserDriver, BrowserSession, LaunchOptions};
use crate::error::BrowserError;
use crate::infrastructure::JsExecutor;
use crate::models::control::LocatedControl;
use crate::models::{ControlPattern, FoundControl};

/// 未指定可执行文件时用于查询版本的命令
const DEFAULT_BROWSER_BINARY: &str = "google-chrome";

/// 等待浏览器进程退出的时间
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// 查询版本时等待命令返回的时间
const VERSION_TIMEOUT: Duration = CLOSE_TIMEOUT;

static MARKER_SEQ: AtomicU64 = AtomicU64::new(0);

/// 基于 chromiumoxide 的无头浏览器驱动
#[derive(Debug, Clone, Default)]
pub struct ChromiumDriver {
    executable: Option<PathBuf>,
}

impl ChromiumDriver {
    pub fn new(executable: Option<PathBuf>) -> Self {
        Self { executable }
    }

    fn browser_config(&self, options: &LaunchOptions) -> Result<BrowserConfig, BrowserError> {
        let (width, height) = options.window_size;
        let mut builder = BrowserConfig::builder()
            .new_headless_mode()
            .user_data_dir(&options.profile_dir)
            .window_size(width, height)
            .args(vec![
                "--no-sandbox",            // 容器内没有沙盒权限
                "--disable-dev-shm-usage", // 防止共享内存不足
                "--disable-gpu",
                "--disable-extensions",
            ]);

        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(|e| {
            error!("配置无头浏览器失败: {}", e);
            BrowserError::Launch(format!("配置无头浏览器失败: {}", e))
        })
    }

    /// 写入首选项并启动浏览器进程，失败时配置目录由调用方清理
    async fn start_browser(&self, options: &LaunchOptions) -> Result<(Browser, Handler), BrowserError> {
        write_preferences(options).await?;
        let config = self.browser_config(options)?;

        Browser::launch(config).await.map_err(|e| {
            error!("启动无头浏览器失败: {}", e);
            BrowserError::Launch(e.to_string())
        })
    }
}

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn launch(&self, options: LaunchOptions) -> Result<Box<dyn BrowserSession>, BrowserError> {
        info!("🚀 启动无头浏览器...");
        debug!("下载目录: {}", options.download_dir.display());

        let (mut browser, mut handler) = match self.start_browser(&options).await {
            Ok(started) => started,
            Err(e) => {
                remove_profile(&options.profile_dir).await;
                return Err(e);
            }
        };
        debug!("无头浏览器启动成功");

        // 在后台处理浏览器事件
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("浏览器事件处理出错: {}", e);
                }
            }
        });

        // 添加短暂延迟以等待浏览器状态同步
        sleep(Duration::from_millis(300)).await;

        let page = match open_page(&browser, &options.download_dir).await {
            Ok(page) => page,
            Err(e) => {
                shutdown_browser(&mut browser).await;
                handler_task.abort();
                remove_profile(&options.profile_dir).await;
                return Err(e);
            }
        };

        Ok(Box::new(ChromiumSession {
            browser,
            executor: JsExecutor::new(page),
            handler: handler_task,
            profile_dir: options.profile_dir,
            closed: false,
        }))
    }

    async fn version(&self) -> Option<String> {
        let binary = self
            .executable
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_BROWSER_BINARY));

        let mut command = Command::new(&binary);
        command.arg("--version").kill_on_drop(true);
        let output = match timeout(VERSION_TIMEOUT, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!("读取浏览器版本失败: {}", e);
                return None;
            }
            Err(_) => {
                warn!("读取浏览器版本超时: {}", binary.display());
                return None;
            }
        };
        if !output.status.success() {
            return None;
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!version.is_empty()).then_some(version)
    }
}

/// 写入浏览器首选项：不弹下载对话框，PDF 直接保存而不是在浏览器内打开
async fn write_preferences(options: &LaunchOptions) -> Result<(), BrowserError> {
    let default_dir = options.profile_dir.join("Default");
    let prefs = json!({
        "download": {
            "default_directory": options.download_dir.to_string_lossy(),
            "prompt_for_download": false,
            "directory_upgrade": true,
        },
        "plugins": {
            "always_open_pdf_externally": true,
        },
    });

    let content = serde_json::to_vec_pretty(&prefs)?;
    tokio::fs::create_dir_all(&default_dir)
        .await
        .map_err(|e| BrowserError::Launch(format!("创建浏览器配置目录失败: {}", e)))?;
    tokio::fs::write(default_dir.join("Preferences"), content)
        .await
        .map_err(|e| BrowserError::Launch(format!("写入浏览器首选项失败: {}", e)))
}

/// 创建空白页面并允许下载到任务目录
async fn open_page(browser: &Browser, download_dir: &Path) -> Result<Page, BrowserError> {
    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建页面失败: {}", e);
        BrowserError::Launch(format!("创建页面失败: {}", e))
    })?;

    let mut behavior = SetDownloadBehaviorParams::new(SetDownloadBehaviorBehavior::Allow);
    behavior.download_path = Some(download_dir.to_string_lossy().into_owned());
    browser.execute(behavior).await.map_err(|e| {
        error!("设置下载目录失败: {}", e);
        BrowserError::Launch(format!("设置下载目录失败: {}", e))
    })?;

    Ok(page)
}

/// 关闭浏览器，关闭失败或超时则强制结束进程
async fn shutdown_browser(browser: &mut Browser) {
    let closed = match browser.close().await {
        Ok(_) => matches!(timeout(CLOSE_TIMEOUT, browser.wait()).await, Ok(Ok(_))),
        Err(e) => {
            warn!("关闭浏览器失败: {}", e);
            false
        }
    };

    if !closed {
        if let Some(Err(e)) = browser.kill().await {
            warn!("强制结束浏览器进程失败: {}", e);
        }
    }
}

async fn remove_profile(profile_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(profile_dir).await {
        debug!("删除浏览器配置目录 {} 失败: {}", profile_dir.display(), e);
    }
}

/// chromiumoxide 会话：一个浏览器进程 + 一个页面
pub struct ChromiumSession {
    browser: Browser,
    executor: JsExecutor,
    handler: JoinHandle<()>,
    profile_dir: PathBuf,
    closed: bool,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.executor.page().goto(url).await.map_err(|e| {
            error!("导航到 {} 失败: {}", url, e);
            BrowserError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;
        info!("已导航到: {}", url);
        Ok(())
    }

    async fn is_ready(&mut self) -> Result<bool, BrowserError> {
        let state: String = self.executor.eval_as("document.readyState").await?;
        Ok(state == "complete")
    }

    async fn find(&mut self, pattern: &ControlPattern) -> Result<Option<FoundControl>, BrowserError> {
        let marker = format!("pdf-control-{}", MARKER_SEQ.fetch_add(1, Ordering::Relaxed));
        let located: LocatedControl = self.executor.eval_as(pattern.locate_script(&marker)).await?;
        Ok(located.into_found(*pattern, marker))
    }

    async fn scroll_into_view(&mut self, control: &FoundControl) -> Result<(), BrowserError> {
        let element = self.executor.find_element(&control.selector()).await?;
        element
            .scroll_into_view()
            .await
            .map_err(|e| BrowserError::Element(format!("滚动到控件失败: {}", e)))?;
        Ok(())
    }

    async fn click(&mut self, control: &FoundControl) -> Result<(), BrowserError> {
        let element = self.executor.find_element(&control.selector()).await?;
        element
            .click()
            .await
            .map_err(|e| BrowserError::Element(format!("点击控件失败: {}", e)))?;
        Ok(())
    }

    async fn terminate(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        shutdown_browser(&mut self.browser).await;
        self.handler.abort();
        remove_profile(&self.profile_dir).await;
        debug!("浏览器会话已关闭");
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        // Browser 自身在 drop 时会结束子进程
        self.handler.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_failed_launch_removes_profile() {
        let root = tempfile::tempdir().unwrap();
        let profile_dir = root.path().join("profile");
        let driver = ChromiumDriver::new(Some(root.path().join("no-such-chrome")));

        let result = driver
            .launch(LaunchOptions::new(root.path().to_path_buf(), profile_dir.clone()))
            .await;

        assert!(matches!(result, Err(BrowserError::Launch(_))));
        assert!(!profile_dir.exists());
    }

    #[tokio::test]
    async fn test_version_of_missing_binary_is_none() {
        let root = tempfile::tempdir().unwrap();
        let driver = ChromiumDriver::new(Some(root.path().join("no-such-chrome")));
        assert_eq!(driver.version().await, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_version_gives_up_on_hanging_binary() {
        use std::os::unix::fs::PermissionsExt;

        let root = tempfile::tempdir().unwrap();
        let script = root.path().join("hanging-chrome");
        std::fs::write(&script, "#!/bin/sh\nsleep 60\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let driver = ChromiumDriver::new(Some(script));
        let started = std::time::Instant::now();
        assert_eq!(driver.version().await, None);
        assert!(started.elapsed() < VERSION_TIMEOUT + Duration::from_secs(5));
    }
}
