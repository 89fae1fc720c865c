//! # Well PDF Fetch
//!
//! 一个通过无头浏览器从第三方页面抓取 PDF 的 HTTP 服务
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `browser/` - `BrowserDriver` / `BrowserSession` 接口及 chromiumoxide 实现
//!
//! ### ② 状态层（Services）
//! - `JobRegistry` - 任务登记表
//! - `DownloadStore` - 下载记录存储
//! - `Janitor` - 过期文件清理
//!
//! ### ③ 编排层（Orchestration）
//! - `orchestrator/dispatcher` - 接收任务，控制并发
//! - `orchestrator/job_processor` - 驱动浏览器完成单个任务
//!
//! ### ④ 接口层（API）
//! - `api/` - axum 路由与处理函数
//!
//! ## 模块结构

pub mod api;
pub mod app;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod state;
pub mod utils;

// 重新导出常用类型
pub use api::create_router;
pub use app::App;
pub use browser::{BrowserDriver, BrowserSession, ChromiumDriver, LaunchOptions};
pub use config::Config;
pub use error::{AppError, BrowserError, Result};
pub use models::{DownloadRecord, Job, JobId, JobStatus};
pub use state::AppState;
