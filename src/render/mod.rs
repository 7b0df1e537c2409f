//! Render engines: turning URLs into queryable documents
//!
//! The crawl loop only sees two traits. A [`RenderEngine`] opens one
//! [`RenderSession`] per crawl job; the session renders pages and is closed
//! when the job ends. Two engines are provided:
//!
//! - `http`: plain HTTP fetch with reqwest, no JavaScript
//! - `browser`: headless Chrome via chromiumoxide (cargo feature `browser`)
//!
//! Whatever the engine, a successful render must already satisfy the
//! configured readiness contract (`wait-for`, `auto-scroll`).

#[cfg(feature = "browser")]
mod browser;
mod http;

#[cfg(feature = "browser")]
pub use browser::BrowserEngine;
pub use http::StaticEngine;

use crate::config::{EngineKind, RenderConfig};
use crate::{ConfigError, FetchResult};
use async_trait::async_trait;
use scraper::html::Select;
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A rendered page as returned by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSource {
    /// URL of the document after redirects
    pub final_url: Url,

    /// Serialized document
    pub html: String,
}

/// Opens render sessions
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Short engine name for logs
    fn name(&self) -> &'static str;

    /// Acquires a session owned exclusively by one crawl job
    async fn open_session(&self) -> FetchResult<Box<dyn RenderSession>>;
}

/// A render session (an HTTP client or a browser) owned by one crawl job
#[async_trait]
pub trait RenderSession: Send {
    /// Renders `url` within `timeout`
    ///
    /// Failures are classified so the caller can decide whether to retry.
    async fn render(&mut self, url: &Url, timeout: Duration) -> FetchResult<PageSource>;

    /// Best-effort diagnostic artifact for the last rendered page
    ///
    /// Returns the artifact path, or None when the engine cannot capture one.
    async fn capture_diagnostic(&mut self, label: &str) -> Option<PathBuf>;

    /// Releases the session
    async fn close(self: Box<Self>) -> FetchResult<()>;
}

/// A parsed page plus the URL its relative links resolve against
///
/// Snapshots are built from a [`PageSource`] after rendering and dropped once
/// extraction and pagination for that page are done.
pub struct PageSnapshot {
    document: Html,
    base_url: Url,
}

impl PageSnapshot {
    /// Parses a rendered page
    pub fn parse(source: &PageSource) -> Self {
        Self::from_html(&source.html, source.final_url.clone())
    }

    pub fn from_html(html: &str, base_url: Url) -> Self {
        Self {
            document: Html::parse_document(html),
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Iterates elements matching `selector` in document order
    pub fn select<'a, 'b>(&'a self, selector: &'b Selector) -> Select<'a, 'b> {
        self.document.select(selector)
    }
}

/// Builds the engine named by the render configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn RenderEngine>)` - Engine ready to open sessions
/// * `Err(ConfigError)` - The engine is unavailable or its settings are invalid
pub fn build_engine(config: &RenderConfig) -> Result<Arc<dyn RenderEngine>, ConfigError> {
    match config.engine {
        EngineKind::Static => Ok(Arc::new(StaticEngine::new(config)?)),
        #[cfg(feature = "browser")]
        EngineKind::Browser => Ok(Arc::new(BrowserEngine::new(config)?)),
        #[cfg(not(feature = "browser"))]
        EngineKind::Browser => Err(ConfigError::UnsupportedEngine(
            "browser (rebuild with `--features browser`)".to_string(),
        )),
    }
}
