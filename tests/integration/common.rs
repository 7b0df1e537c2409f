//! Scripted render engine and config helpers shared by the integration tests

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use trawl::config::{parse_config, Config};
use trawl::{FetchError, FetchResult, PageSource, RenderEngine, RenderSession};
use url::Url;

/// One scripted response for a URL
#[derive(Debug, Clone)]
pub enum Step {
    /// Render succeeds with this document
    Page(String),

    /// Render succeeds after a redirect to another URL
    Redirect { to: String, html: String },

    /// Render fails
    Fail(FetchError),

    /// Render takes `Duration` before succeeding
    Slow(Duration, String),

    /// Render succeeds and cancels `token` before returning
    CancelDuring { token: CancellationToken, html: String },
}

#[derive(Debug, Default)]
pub struct Stats {
    open_calls: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    attempts: Mutex<Vec<(String, Instant)>>,
}

impl Stats {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Times at which `url` was requested
    pub fn attempts_for(&self, url: &str) -> Vec<Instant> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }
}

/// Engine that answers each URL from a queue of scripted steps
///
/// A URL with no steps left answers with a Fatal error.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    script: Arc<Mutex<HashMap<String, VecDeque<Step>>>>,
    pub stats: Arc<Stats>,
    fail_open_for_session: Option<usize>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, url: &str, step: Step) -> Self {
        self.script
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(step);
        self
    }

    pub fn page(self, url: &str, html: &str) -> Self {
        self.on(url, Step::Page(html.to_string()))
    }

    pub fn fail(self, url: &str, error: FetchError) -> Self {
        self.on(url, Step::Fail(error))
    }

    /// Makes the nth opened session (0-based) fail to open
    pub fn fail_session(mut self, nth: usize) -> Self {
        self.fail_open_for_session = Some(nth);
        self
    }

    pub fn into_arc(self) -> Arc<dyn RenderEngine> {
        Arc::new(self)
    }
}

#[async_trait]
impl RenderEngine for ScriptedEngine {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn open_session(&self) -> FetchResult<Box<dyn RenderSession>> {
        let nth = self.stats.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open_for_session == Some(nth) {
            return Err(FetchError::Fatal {
                url: "about:blank".to_string(),
                reason: "browser failed to launch".to_string(),
            });
        }
        self.stats.opened.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(ScriptedSession {
            script: Arc::clone(&self.script),
            stats: Arc::clone(&self.stats),
        }))
    }
}

struct ScriptedSession {
    script: Arc<Mutex<HashMap<String, VecDeque<Step>>>>,
    stats: Arc<Stats>,
}

#[async_trait]
impl RenderSession for ScriptedSession {
    async fn render(&mut self, url: &Url, timeout: Duration) -> FetchResult<PageSource> {
        self.stats
            .attempts
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));

        let step = self
            .script
            .lock()
            .unwrap()
            .get_mut(url.as_str())
            .and_then(|queue| queue.pop_front());

        match step {
            Some(Step::Page(html)) => Ok(PageSource {
                final_url: url.clone(),
                html,
            }),
            Some(Step::Redirect { to, html }) => Ok(PageSource {
                final_url: Url::parse(&to).unwrap(),
                html,
            }),
            Some(Step::Fail(error)) => Err(error),
            Some(Step::CancelDuring { token, html }) => {
                token.cancel();
                Ok(PageSource {
                    final_url: url.clone(),
                    html,
                })
            }
            Some(Step::Slow(delay, html)) => {
                if delay > timeout {
                    tokio::time::sleep(timeout).await;
                    return Err(FetchError::Transient {
                        url: url.to_string(),
                        reason: "timed out".to_string(),
                    });
                }
                tokio::time::sleep(delay).await;
                Ok(PageSource {
                    final_url: url.clone(),
                    html,
                })
            }
            None => Err(FetchError::Fatal {
                url: url.to_string(),
                reason: "no scripted response".to_string(),
            }),
        }
    }

    async fn capture_diagnostic(&mut self, label: &str) -> Option<PathBuf> {
        Some(PathBuf::from(format!("scripted/{}.png", label)))
    }

    async fn close(self: Box<Self>) -> FetchResult<()> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn transient(url: &str) -> FetchError {
    FetchError::Transient {
        url: url.to_string(),
        reason: "HTTP 503".to_string(),
    }
}

pub fn fatal(url: &str) -> FetchError {
    FetchError::Fatal {
        url: url.to_string(),
        reason: "HTTP 404".to_string(),
    }
}

/// A listing page with a title and an optional next link
pub fn listing(title: &str, next: Option<&str>) -> String {
    let next = next
        .map(|href| format!(r#"<a class="next" href="{}">Next</a>"#, href))
        .unwrap_or_default();
    format!(
        "<html><head><title>{}</title></head><body><h1>{}</h1>{}</body></html>",
        title, title, next
    )
}

/// Builds a validated config for `start_urls` with a `title` field
pub fn config(start_urls: &[&str], crawler_extra: &str) -> Config {
    let urls = start_urls
        .iter()
        .map(|u| format!("\"{}\"", u))
        .collect::<Vec<_>>()
        .join(", ");

    parse_config(&format!(
        r#"
[crawler]
start-urls = [{}]
pagination-selector = "a.next"
{}

[output]
path = "unused.json"

[[fields]]
name = "title"
selector = "title"
"#,
        urls, crawler_extra
    ))
    .unwrap()
}
