//! 浏览器驱动接口
//!
//! 编排层只依赖这里的两个 trait，真实实现见 `headless`

pub mod headless;

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::BrowserError;
use crate::models::{ControlPattern, FoundControl};

pub use headless::ChromiumDriver;

/// 每个任务启动浏览器时使用的参数
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// 任务专属下载目录
    pub download_dir: PathBuf,
    /// 任务专属浏览器配置目录
    pub profile_dir: PathBuf,
    pub window_size: (u32, u32),
}

impl LaunchOptions {
    pub fn new(download_dir: PathBuf, profile_dir: PathBuf) -> Self {
        Self {
            download_dir,
            profile_dir,
            window_size: (1920, 1080),
        }
    }
}

/// 浏览器驱动，负责为任务启动会话
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch(&self, options: LaunchOptions) -> Result<Box<dyn BrowserSession>, BrowserError>;

    /// 浏览器版本，失败时返回 None
    async fn version(&self) -> Option<String>;
}

/// 一个浏览器会话（一个进程、一个页面）
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// 页面是否已加载完成
    async fn is_ready(&mut self) -> Result<bool, BrowserError>;

    /// 按规则查找控件，返回第一个匹配
    async fn find(&mut self, pattern: &ControlPattern) -> Result<Option<FoundControl>, BrowserError>;

    async fn scroll_into_view(&mut self, control: &FoundControl) -> Result<(), BrowserError>;

    async fn click(&mut self, control: &FoundControl) -> Result<(), BrowserError>;

    /// 关闭浏览器进程，不返回错误
    async fn terminate(&mut self);
}
