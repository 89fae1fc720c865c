use thiserror::Error;

use crate::models::{JobId, JobStatus};

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 请求参数校验失败
    #[error("参数校验失败: {0}")]
    Validation(String),

    /// 并发数已满，需稍后重试
    #[error("当前已有 {limit} 个下载任务在运行，请稍后重试")]
    RateLimited { limit: usize },

    /// 任务存储已满且没有可淘汰的已结束任务
    #[error("任务存储已满 (上限 {capacity})，且没有可淘汰的已结束任务")]
    CapacityExhausted { capacity: usize },

    /// 任务不存在
    #[error("任务不存在: {0}")]
    JobNotFound(JobId),

    /// 下载文件不存在
    #[error("任务 {0} 没有可下载的文件")]
    DownloadNotFound(JobId),

    /// 下载文件已过期
    #[error("任务 {0} 的下载文件已过期")]
    DownloadExpired(JobId),

    /// 非法的状态流转
    #[error("任务 {job_id} 状态不能从 {from} 变为 {to}")]
    InvalidTransition {
        job_id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),

    /// 文件操作错误
    #[error("文件错误: {0}")]
    Io(#[from] std::io::Error),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {0}")]
    Launch(String),

    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    Navigation { url: String, reason: String },

    /// 执行脚本失败
    #[error("执行脚本失败: {0}")]
    Script(String),

    /// 元素操作失败
    #[error("元素操作失败: {0}")]
    Element(String),

    /// 等待超时
    #[error("{0}")]
    Timeout(String),
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Script(err.to_string())
    }
}

impl From<serde_json::Error> for BrowserError {
    fn from(err: serde_json::Error) -> Self {
        BrowserError::Script(format!("脚本返回值解析失败: {}", err))
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}

/// 应用程序结果类型
pub type Result<T> = std::result::Result<T, AppError>;
