use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppError, Result};

/// 保留时间上限（十年）
const MAX_RETENTION_SECS: u64 = 10 * 365 * 24 * 3600;

/// 程序配置
///
/// 加载顺序：默认值 → `CONFIG_FILE` 指定的 TOML 文件 → 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 监听地址
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 下载文件根目录，每个任务一个子目录
    pub download_dir: PathBuf,
    /// 允许抓取的 URL 前缀
    pub allowed_url_prefix: String,
    /// 同时运行的浏览器会话数
    pub max_concurrent_jobs: usize,
    /// 内存中最多保存的任务数
    pub max_stored_jobs: usize,
    /// 下载文件保留时间（秒）
    pub retention_secs: u64,
    /// 清理任务执行间隔（秒）
    pub janitor_interval_secs: u64,
    /// 等待页面加载完成的超时（秒）
    pub page_ready_timeout_secs: u64,
    /// 滚动到按钮后、点击前的停顿（毫秒）
    pub click_pause_ms: u64,
    /// 点击后等待文件落盘的时间（秒）
    pub post_click_wait_secs: u64,
    /// 浏览器可执行文件，为空时自动探测
    pub chrome_executable: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            download_dir: PathBuf::from("downloads"),
            allowed_url_prefix: "https://fracfocus.org/".to_string(),
            max_concurrent_jobs: 2,
            max_stored_jobs: 100,
            retention_secs: 3600,
            janitor_interval_secs: 300,
            page_ready_timeout_secs: 30,
            click_pause_ms: 1000,
            post_click_wait_secs: 10,
            chrome_executable: None,
        }
    }
}

impl Config {
    /// 从配置文件（可选）和环境变量加载
    pub fn load() -> Result<Self> {
        let base = match std::env::var("CONFIG_FILE") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        Ok(base.with_env(|name| std::env::var(name).ok()))
    }

    pub fn from_env() -> Self {
        Self::default().with_env(|name| std::env::var(name).ok())
    }

    /// 读取 TOML 配置文件，缺省字段取默认值
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("读取配置文件 {} 失败: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 用环境变量覆盖当前配置，无法解析的值保留原值
    pub fn with_env<F>(self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            host: lookup("HOST").unwrap_or(self.host),
            port: parse_or(&lookup, "PORT", self.port),
            download_dir: lookup("DOWNLOAD_DIR").map(PathBuf::from).unwrap_or(self.download_dir),
            allowed_url_prefix: lookup("ALLOWED_URL_PREFIX").unwrap_or(self.allowed_url_prefix),
            max_concurrent_jobs: parse_or(&lookup, "MAX_CONCURRENT_JOBS", self.max_concurrent_jobs),
            max_stored_jobs: parse_or(&lookup, "MAX_STORED_JOBS", self.max_stored_jobs),
            retention_secs: parse_or(&lookup, "RETENTION_SECS", self.retention_secs),
            janitor_interval_secs: parse_or(&lookup, "JANITOR_INTERVAL_SECS", self.janitor_interval_secs),
            page_ready_timeout_secs: parse_or(&lookup, "PAGE_READY_TIMEOUT_SECS", self.page_ready_timeout_secs),
            click_pause_ms: parse_or(&lookup, "CLICK_PAUSE_MS", self.click_pause_ms),
            post_click_wait_secs: parse_or(&lookup, "POST_CLICK_WAIT_SECS", self.post_click_wait_secs),
            chrome_executable: lookup("CHROME_BIN").map(PathBuf::from).or(self.chrome_executable),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn retention(&self) -> chrono::Duration {
        let secs = self.retention_secs.min(MAX_RETENTION_SECS);
        chrono::Duration::seconds(secs as i64)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs.max(1))
    }

    pub fn page_ready_timeout(&self) -> Duration {
        Duration::from_secs(self.page_ready_timeout_secs)
    }

    pub fn click_pause(&self) -> Duration {
        Duration::from_millis(self.click_pause_ms)
    }

    pub fn post_click_wait(&self) -> Duration {
        Duration::from_secs(self.post_click_wait_secs)
    }
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str, fallback: T) -> T {
    lookup(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}
