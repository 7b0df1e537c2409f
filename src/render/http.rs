//! Static render engine
//!
//! This module fetches pages with a plain HTTP client, including:
//! - Building HTTP clients with the configured user agent, headers and proxy
//! - GET requests with a per-page timeout
//! - Error classification into transient and fatal failures
//! - Checking the readiness selector against the fetched document
//!
//! There is no JavaScript execution. A document that lacks the readiness
//! selector cannot become ready later, so the check is reported as a render
//! failure and left to the retry policy.

use crate::config::RenderConfig;
use crate::render::{PageSource, RenderEngine, RenderSession};
use crate::{ConfigError, FetchError, FetchResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{redirect::Policy, Client, Proxy, StatusCode};
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Maximum redirect hops followed per request
const MAX_REDIRECTS: usize = 10;

/// Engine that fetches and parses pages without a browser
pub struct StaticEngine {
    config: RenderConfig,
    wait_for: Option<Selector>,
}

impl StaticEngine {
    /// Creates the engine, checking that a client can be built from `config`
    pub fn new(config: &RenderConfig) -> Result<Self, ConfigError> {
        build_http_client(config)
            .map_err(|e| ConfigError::Validation(format!("Failed to build HTTP client: {}", e)))?;

        let wait_for = config
            .wait_for
            .as_deref()
            .map(crate::config::validation::parse_selector)
            .transpose()?;

        Ok(Self {
            config: config.clone(),
            wait_for,
        })
    }
}

#[async_trait]
impl RenderEngine for StaticEngine {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn open_session(&self) -> FetchResult<Box<dyn RenderSession>> {
        let client = build_http_client(&self.config).map_err(|e| FetchError::Fatal {
            url: String::new(),
            reason: format!("failed to build HTTP client: {}", e),
        })?;

        Ok(Box::new(StaticSession {
            client,
            wait_for: self.wait_for.clone(),
        }))
    }
}

/// One job's HTTP client
struct StaticSession {
    client: Client,
    wait_for: Option<Selector>,
}

#[async_trait]
impl RenderSession for StaticSession {
    async fn render(&mut self, url: &Url, timeout: Duration) -> FetchResult<PageSource> {
        fetch_page(&self.client, url, timeout, self.wait_for.as_ref()).await
    }

    async fn capture_diagnostic(&mut self, _label: &str) -> Option<PathBuf> {
        None
    }

    async fn close(self: Box<Self>) -> FetchResult<()> {
        Ok(())
    }
}

/// Builds an HTTP client from the render configuration
///
/// # Arguments
///
/// * `config` - The render configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &RenderConfig) -> Result<Client, reqwest::Error> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.headers {
        // Invalid headers are rejected by config validation
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            headers.insert(name, value);
        }
    }

    let mut builder = Client::builder()
        .user_agent(config.user_agent.clone())
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = &config.proxy {
        builder = builder.proxy(Proxy::all(proxy.as_str())?);
    }

    builder.build()
}

/// Fetches one page and classifies any failure
///
/// # Classification
///
/// | Condition | Result |
/// |-----------|--------|
/// | Scheme other than http/https | Fatal |
/// | Timeout, connection error | Transient |
/// | Redirect loop / too many redirects | Fatal |
/// | HTTP 429, HTTP 5xx | Transient |
/// | Other non-2xx | Fatal |
/// | Non-HTML Content-Type | Fatal |
/// | Body decode failure | Fatal |
/// | Readiness selector absent | Render |
pub async fn fetch_page(
    client: &Client,
    url: &Url,
    timeout: Duration,
    wait_for: Option<&Selector>,
) -> FetchResult<PageSource> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(FetchError::Fatal {
            url: url.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    tracing::debug!("GET {}", url);
    let response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| classify_transport_error(url, &e))?;

    let status = response.status();
    let final_url = response.url().clone();

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return Err(FetchError::Transient {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        });
    }

    if !status.is_success() {
        return Err(FetchError::Fatal {
            url: url.to_string(),
            reason: format!("HTTP {}", status.as_u16()),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if !content_type.is_empty() && !content_type.contains("html") && !content_type.contains("xml") {
        return Err(FetchError::Fatal {
            url: url.to_string(),
            reason: format!("expected HTML, got {}", content_type),
        });
    }

    let html = response.text().await.map_err(|e| {
        if e.is_decode() {
            FetchError::Fatal {
                url: url.to_string(),
                reason: format!("malformed response body: {}", e),
            }
        } else {
            classify_transport_error(url, &e)
        }
    })?;

    if let Some(selector) = wait_for {
        if !document_contains(&html, selector) {
            return Err(FetchError::Render {
                url: url.to_string(),
                reason: "readiness selector not present in document".to_string(),
            });
        }
    }

    Ok(PageSource { final_url, html })
}

fn document_contains(html: &str, selector: &Selector) -> bool {
    Html::parse_document(html).select(selector).next().is_some()
}

fn classify_transport_error(url: &Url, error: &reqwest::Error) -> FetchError {
    let url = url.to_string();

    if error.is_timeout() {
        FetchError::Transient {
            url,
            reason: "request timed out".to_string(),
        }
    } else if error.is_redirect() {
        FetchError::Fatal {
            url,
            reason: format!("redirect error: {}", error),
        }
    } else if error.is_builder() {
        FetchError::Fatal {
            url,
            reason: format!("invalid request: {}", error),
        }
    } else if error.is_connect() {
        FetchError::Transient {
            url,
            reason: format!("connection failed: {}", error),
        }
    } else {
        FetchError::Transient {
            url,
            reason: error.to_string(),
        }
    }
}
