//! 日志工具模块
//!
//! 初始化 tracing 输出，并提供启动信息的格式化输出
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// 初始化日志
///
/// 日志级别由 `RUST_LOG` 控制，默认 info；重复调用不会报错
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,chromiumoxide=warn,hyper=warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - PDF 下载服务");
    info!("🌐 监听地址: {}", config.bind_address());
    info!("📁 下载目录: {}", config.download_dir.display());
    info!("🔗 允许的 URL 前缀: {}", config.allowed_url_prefix);
    info!(
        "📊 最大并发数: {} | 最多保存任务: {}",
        config.max_concurrent_jobs, config.max_stored_jobs
    );
    info!(
        "⏱️ 文件保留 {} 秒 | 清理间隔 {} 秒",
        config.retention_secs, config.janitor_interval_secs
    );
    match &config.chrome_executable {
        Some(path) => info!("🧭 浏览器: {}", path.display()),
        None => info!("🧭 浏览器: 自动探测"),
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
