//! Headless Chrome render engine
//!
//! Each session launches its own browser with one page. A render navigates
//! the page, waits for the readiness selector, optionally scrolls to trigger
//! lazy content, and then reads back the rendered document. Sessions can
//! capture a full-page screenshot when a job fails.

use crate::config::RenderConfig;
use crate::render::{PageSource, RenderEngine, RenderSession};
use crate::{ConfigError, FetchError, FetchResult};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use url::Url;

/// Interval between readiness checks
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(250);

const SCROLL_TO_BOTTOM: &str = "window.scrollTo(0, document.body.scrollHeight)";
const DOCUMENT_HEIGHT: &str = "document.body.scrollHeight";

/// Engine that renders pages in headless Chrome
pub struct BrowserEngine {
    config: RenderConfig,
}

impl BrowserEngine {
    pub fn new(config: &RenderConfig) -> Result<Self, ConfigError> {
        if let Some(selector) = &config.wait_for {
            crate::config::validation::parse_selector(selector)?;
        }

        if !config.headers.is_empty() {
            tracing::warn!("Extra request headers are ignored by the browser engine");
        }

        Ok(Self {
            config: config.clone(),
        })
    }
}

fn launch_config(config: &RenderConfig) -> Result<BrowserConfig, String> {
    let mut builder = BrowserConfig::builder()
        .window_size(1920, 1080)
        .no_sandbox()
        .arg("--disable-gpu")
        .arg(format!("--user-agent={}", config.user_agent));

    if !config.headless {
        builder = builder.with_head();
    }

    if let Some(proxy) = &config.proxy {
        builder = builder.arg(format!("--proxy-server={}", proxy));
    }

    builder.build()
}

fn session_error(reason: String) -> FetchError {
    FetchError::Fatal {
        url: String::new(),
        reason,
    }
}

#[async_trait]
impl RenderEngine for BrowserEngine {
    fn name(&self) -> &'static str {
        "browser"
    }

    async fn open_session(&self) -> FetchResult<Box<dyn RenderSession>> {
        let browser_config = launch_config(&self.config)
            .map_err(|e| session_error(format!("invalid browser config: {}", e)))?;

        let (mut browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| session_error(format!("failed to launch browser: {}", e)))?;

        // The CDP connection only makes progress while its handler is polled
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                handler_task.abort();
                return Err(session_error(format!("failed to open page: {}", e)));
            }
        };

        tracing::debug!("Browser session opened");

        Ok(Box::new(BrowserSession {
            browser,
            page,
            handler_task,
            wait_for: self.config.wait_for.clone(),
            auto_scroll: self.config.auto_scroll,
            scroll_pause: Duration::from_millis(self.config.scroll_pause_ms),
            max_scrolls: self.config.max_scrolls,
            screenshot_dir: self.config.screenshot_dir.clone(),
        }))
    }
}

struct BrowserSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    wait_for: Option<String>,
    auto_scroll: bool,
    scroll_pause: Duration,
    max_scrolls: u32,
    screenshot_dir: PathBuf,
}

impl BrowserSession {
    /// Polls for the readiness selector until `timeout` elapses
    async fn wait_until_ready(&self, url: &Url, selector: &str, timeout: Duration) -> FetchResult<()> {
        let started = Instant::now();

        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }

            if started.elapsed() >= timeout {
                return Err(FetchError::Render {
                    url: url.to_string(),
                    reason: format!("'{}' did not appear within {:?}", selector, timeout),
                });
            }

            tokio::time::sleep(WAIT_POLL_INTERVAL).await;
        }
    }

    /// Scrolls to the bottom until the document stops growing
    async fn scroll_to_end(&self) {
        let mut last_height = self.document_height().await;

        for _ in 0..self.max_scrolls {
            if self.page.evaluate(SCROLL_TO_BOTTOM).await.is_err() {
                break;
            }
            tokio::time::sleep(self.scroll_pause).await;

            let height = self.document_height().await;
            if height == last_height {
                break;
            }
            last_height = height;
        }
    }

    async fn document_height(&self) -> Option<f64> {
        self.page
            .evaluate(DOCUMENT_HEIGHT)
            .await
            .ok()
            .and_then(|result| result.into_value::<f64>().ok())
    }
}

#[async_trait]
impl RenderSession for BrowserSession {
    async fn render(&mut self, url: &Url, timeout: Duration) -> FetchResult<PageSource> {
        tracing::debug!("Loading {} in browser", url);
        let started = Instant::now();

        match tokio::time::timeout(timeout, self.page.goto(url.as_str())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(FetchError::Transient {
                    url: url.to_string(),
                    reason: format!("page load error: {}", e),
                })
            }
            Err(_) => {
                return Err(FetchError::Transient {
                    url: url.to_string(),
                    reason: format!("page load timed out after {:?}", timeout),
                })
            }
        }

        if let Some(selector) = &self.wait_for {
            let remaining = remaining_budget(timeout, started.elapsed());
            self.wait_until_ready(url, selector, remaining).await?;
        }

        if self.auto_scroll {
            self.scroll_to_end().await;
        }

        let html = self.page.content().await.map_err(|e| FetchError::Transient {
            url: url.to_string(),
            reason: format!("failed to read rendered document: {}", e),
        })?;

        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .and_then(|current| Url::parse(&current).ok())
            .unwrap_or_else(|| url.clone());

        Ok(PageSource { final_url, html })
    }

    async fn capture_diagnostic(&mut self, label: &str) -> Option<PathBuf> {
        if let Err(e) = tokio::fs::create_dir_all(&self.screenshot_dir).await {
            tracing::warn!("Cannot create {}: {}", self.screenshot_dir.display(), e);
            return None;
        }

        let file_name = format!(
            "{}_{}.png",
            chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f"),
            sanitize_label(label)
        );
        let path = self.screenshot_dir.join(file_name);

        let params = ScreenshotParams::builder().full_page(true).build();
        match self.page.save_screenshot(params, &path).await {
            Ok(_) => {
                tracing::info!("Screenshot saved: {}", path.display());
                Some(path)
            }
            Err(e) => {
                tracing::warn!("Screenshot failed: {}", e);
                None
            }
        }
    }

    async fn close(self: Box<Self>) -> FetchResult<()> {
        let BrowserSession {
            mut browser,
            page,
            handler_task,
            ..
        } = *self;

        if let Err(e) = page.close().await {
            tracing::debug!("Page close failed: {}", e);
        }

        let result = browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| session_error(format!("failed to close browser: {}", e)));

        let _ = browser.wait().await;
        handler_task.abort();
        result
    }
}

/// Part of the per-page timeout left after `elapsed`
fn remaining_budget(timeout: Duration, elapsed: Duration) -> Duration {
    timeout.saturating_sub(elapsed)
}

/// Keeps screenshot names filesystem-safe
fn sanitize_label(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .take(80)
        .collect();

    if cleaned.is_empty() {
        "page".to_string()
    } else {
        cleaned
    }
}
