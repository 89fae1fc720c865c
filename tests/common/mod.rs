// 测试用的浏览器驱动：不启动真实浏览器，点击时直接往下载目录写入 PDF

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tokio::sync::Semaphore;
use tower::ServiceExt;

use well_pdf_fetch::models::{ControlPattern, FoundControl};
use well_pdf_fetch::{BrowserDriver, BrowserError, BrowserSession, Config, Job, LaunchOptions};

pub const ALLOWED_URL: &str = "https://fracfocus.org/wells/12345";
pub const FAKE_PDF: &[u8] = b"%PDF-1.4\n% fake disclosure\n";

/// 假会话的行为
#[derive(Debug, Clone)]
pub struct FakeBehavior {
    /// 哪条规则能匹配到控件，None 表示页面上没有控件
    pub matching_pattern: Option<ControlPattern>,
    /// 点击后是否写入 PDF
    pub writes_pdf: bool,
    pub fail_navigation: bool,
    /// 导航时直接 panic
    pub panic_on_navigate: bool,
    pub never_ready: bool,
}

impl Default for FakeBehavior {
    fn default() -> Self {
        Self {
            matching_pattern: Some(ControlPattern::TextContains("Download PDF")),
            writes_pdf: true,
            fail_navigation: false,
            panic_on_navigate: false,
            never_ready: false,
        }
    }
}

#[derive(Default)]
pub struct FakeDriver {
    pub behavior: FakeBehavior,
    /// 设置后，导航会一直等到放行
    pub gate: Option<Arc<Semaphore>>,
    pub launched: Arc<AtomicUsize>,
    pub terminated: Arc<AtomicUsize>,
    pub active: Arc<AtomicUsize>,
    pub peak: Arc<AtomicUsize>,
    pub searched: Arc<Mutex<Vec<ControlPattern>>>,
}

impl FakeDriver {
    pub fn new(behavior: FakeBehavior) -> Self {
        Self {
            behavior,
            ..Default::default()
        }
    }

    pub fn gated(behavior: FakeBehavior) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let driver = Self {
            behavior,
            gate: Some(Arc::clone(&gate)),
            ..Default::default()
        };
        (driver, gate)
    }

    pub fn searched_patterns(&self) -> Vec<ControlPattern> {
        self.searched.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn launch(&self, options: LaunchOptions) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.launched.fetch_add(1, Ordering::SeqCst);
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        Ok(Box::new(FakeSession {
            download_dir: options.download_dir,
            behavior: self.behavior.clone(),
            gate: self.gate.clone(),
            terminated: Arc::clone(&self.terminated),
            active: Arc::clone(&self.active),
            searched: Arc::clone(&self.searched),
            closed: false,
        }))
    }

    async fn version(&self) -> Option<String> {
        Some("FakeChrome 1.0".to_string())
    }
}

struct FakeSession {
    download_dir: PathBuf,
    behavior: FakeBehavior,
    gate: Option<Arc<Semaphore>>,
    terminated: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    searched: Arc<Mutex<Vec<ControlPattern>>>,
    closed: bool,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.behavior.panic_on_navigate {
            panic!("navigate blew up on {}", url);
        }
        if self.behavior.fail_navigation {
            return Err(BrowserError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        Ok(())
    }

    async fn is_ready(&mut self) -> Result<bool, BrowserError> {
        Ok(!self.behavior.never_ready)
    }

    async fn find(&mut self, pattern: &ControlPattern) -> Result<Option<FoundControl>, BrowserError> {
        self.searched.lock().unwrap().push(*pattern);
        Ok((self.behavior.matching_pattern == Some(*pattern)).then(|| FoundControl {
            pattern: *pattern,
            marker: "fake-0".to_string(),
            match_count: 1,
            text: "Download PDF".to_string(),
        }))
    }

    async fn scroll_into_view(&mut self, _control: &FoundControl) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn click(&mut self, _control: &FoundControl) -> Result<(), BrowserError> {
        if self.behavior.writes_pdf {
            tokio::fs::write(self.download_dir.join("well-disclosure.pdf"), FAKE_PDF)
                .await
                .map_err(|e| BrowserError::Element(e.to_string()))?;
        }
        Ok(())
    }

    async fn terminate(&mut self) {
        if !self.closed {
            self.closed = true;
            self.terminated.fetch_add(1, Ordering::SeqCst);
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// 等待时间都压到最短的测试配置
pub fn test_config(download_dir: &Path) -> Config {
    Config {
        download_dir: download_dir.to_path_buf(),
        page_ready_timeout_secs: 1,
        click_pause_ms: 0,
        post_click_wait_secs: 0,
        ..Config::default()
    }
}

pub fn post_download(well_url: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/download")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::json!({ "well_url": well_url }).to_string()))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

pub async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(router, request).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

/// 提交任务并返回 job_id
pub async fn submit(router: &Router, well_url: &str) -> String {
    let (status, body) = send_json(router, post_download(well_url)).await;
    assert_eq!(status, StatusCode::ACCEPTED, "unexpected body: {}", body);
    body["job_id"].as_str().unwrap().to_string()
}

/// 轮询直到任务进入终态
pub async fn wait_for_terminal(router: &Router, job_id: &str) -> Job {
    for _ in 0..200 {
        let (status, body) = send_json(router, get(&format!("/api/jobs/{}", job_id))).await;
        assert_eq!(status, StatusCode::OK);
        let job: Job = serde_json::from_value(body).unwrap();
        if job.status.is_terminal() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("job {} did not finish in time", job_id);
}
