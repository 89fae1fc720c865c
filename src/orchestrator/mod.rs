//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `dispatcher` - 任务调度器
//! - 校验请求 URL
//! - 控制并发数量（ConcurrencyLimiter）
//! - 登记任务，必要时淘汰旧任务
//! - 为每个任务启动一个后台 tokio 任务
//!
//! ### `job_processor` - 单个任务处理器
//! - 持有浏览器会话的生命周期
//! - 定位并点击下载按钮
//! - 收集下载文件，写回任务状态
//!
//! ### `limiter` - 并发限制器
//! - 非阻塞获取名额，名额随任务结束自动归还
//!
//! ## 层次关系
//!
//! ```text
//! api (HTTP)
//!     ↓
//! dispatcher (接收 Job)
//!     ↓
//! job_processor (处理单个 Job)
//!     ↓
//! browser (BrowserDriver / BrowserSession)
//!     ↓
//! infrastructure (JsExecutor)
//! ```

pub mod dispatcher;
pub mod job_processor;
pub mod limiter;

pub use dispatcher::Dispatcher;
pub use job_processor::{find_downloaded_pdf, locate_control, JobOutcome, JobProcessor, JobTiming};
pub use limiter::{ConcurrencyLimiter, JobPermit};
