use tempfile::TempDir;
use well_pdf_fetch::models::ControlPattern;
use well_pdf_fetch::orchestrator::locate_control;
use well_pdf_fetch::utils::logging;
use well_pdf_fetch::{BrowserDriver, ChromiumDriver, Config, LaunchOptions};

const TEST_PAGE: &str = "data:text/html,<html><body>\
    <a href='/files/a.txt'>Readme</a>\
    <button>Download PDF</button>\
    <button>Download PDF (copy)</button>\
    </body></html>";

#[tokio::test]
#[ignore] // 需要本机安装 Chrome/Chromium，手动运行：cargo test -- --ignored
async fn test_locate_control_in_real_browser() {
    // 初始化日志
    logging::init();

    let config = Config::from_env();
    let driver = ChromiumDriver::new(config.chrome_executable.clone());

    let downloads = TempDir::new().unwrap();
    let profile = TempDir::new().unwrap();
    let mut session = driver
        .launch(LaunchOptions::new(
            downloads.path().to_path_buf(),
            profile.path().join("profile"),
        ))
        .await
        .expect("启动浏览器失败");

    session.navigate(TEST_PAGE).await.expect("打开测试页面失败");
    assert!(session.is_ready().await.unwrap());

    let control = locate_control(session.as_mut())
        .await
        .expect("执行定位脚本失败")
        .expect("应该能找到下载按钮");
    assert_eq!(control.pattern, ControlPattern::TextContains("Download PDF"));
    assert_eq!(control.match_count, 2);
    assert_eq!(control.text, "Download PDF");

    session.scroll_into_view(&control).await.unwrap();
    session.click(&control).await.unwrap();
    session.terminate().await;
}

#[tokio::test]
#[ignore]
async fn test_browser_version() {
    let config = Config::from_env();
    let driver = ChromiumDriver::new(config.chrome_executable);

    let version = driver.version().await;
    assert!(version.is_some(), "应该能够读取浏览器版本");
}
