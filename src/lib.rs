//! Trawl: a declarative page crawl-and-extract engine
//!
//! This crate visits a list of start URLs, applies a table of CSS extraction
//! rules to every page it renders, follows "next page" links, and writes the
//! resulting records to a flat JSON array.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod render;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Run-level error for a complete crawl
///
/// A run only fails before crawling (configuration) or after crawling
/// (writing the output). Page and job failures are reported inside the
/// [`CrawlResult`] instead.
#[derive(Debug, Error)]
pub enum TrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The crawl finished but its output could not be written. The result is
    /// handed back so the caller can retry the write.
    #[error("Failed to write output: {source}")]
    Sink {
        source: SinkError,
        result: Box<CrawlResult>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Duplicate field name: {0}")]
    DuplicateField(String),

    #[error("Unsupported render engine: {0}")]
    UnsupportedEngine(String),
}

/// A classified render-engine failure for one page
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Timeouts, connection resets, 5xx and 429 responses
    #[error("Transient fetch failure for {url}: {reason}")]
    Transient { url: String, reason: String },

    /// 4xx (other than 429), malformed bodies, unsupported schemes
    #[error("Fatal fetch failure for {url}: {reason}")]
    Fatal { url: String, reason: String },

    /// The engine could not satisfy its readiness contract
    #[error("Render failure for {url}: {reason}")]
    Render { url: String, reason: String },
}

impl FetchError {
    /// Returns true if another attempt may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Render { .. })
    }

    /// The diagnostic kind recorded when this error ends a job
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Transient { .. } => FailureKind::FetchTransient,
            Self::Fatal { .. } => FailureKind::FetchFatal,
            Self::Render { .. } => FailureKind::RenderFailure,
        }
    }

    /// The URL the failure was reported for
    pub fn url(&self) -> &str {
        match self {
            Self::Transient { url, .. } | Self::Fatal { url, .. } | Self::Render { url, .. } => url,
        }
    }
}

/// Output sink errors
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to replace output file: {0}")]
    Persist(String),
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for a single render attempt
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for run-level operations
pub type Result<T> = std::result::Result<T, TrawlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Controller, CrawlJob, JobStatus};
pub use extract::{extract, Attribute, ExtractionRule, ExtractionRuleSet, FieldValue, Multiplicity, Record};
pub use output::{CrawlFailure, CrawlResult, FailureKind, JsonSink, OutputSink};
pub use render::{PageSnapshot, PageSource, RenderEngine, RenderSession};

/// Runs a complete crawl described by `config` and writes its output
///
/// Builds the render engine, runs every job to a terminal status, then hands
/// the result to a [`JsonSink`] at `config.output.path` (and the failure
/// report to `config.output.failures_path`, when set).
///
/// # Arguments
///
/// * `config` - A loaded configuration
/// * `cancel` - Run-level cancellation signal
///
/// # Returns
///
/// * `Ok(CrawlResult)` - The crawl ran and its output was written
/// * `Err(TrawlError)` - Configuration was rejected or the output could not be written
pub async fn crawl(config: Config, cancel: CancellationToken) -> Result<CrawlResult> {
    let engine = render::build_engine(&config.render)?;
    let controller = Controller::new(&config, engine)?;

    let result = controller.run(cancel).await;

    let sink = JsonSink::new(&config.output.path).pretty(config.output.pretty);
    if let Err(source) = sink.write(&result) {
        tracing::error!("Failed to write {}: {}", config.output.path.display(), source);
        return Err(TrawlError::Sink {
            source,
            result: Box::new(result),
        });
    }

    if let Some(failures_path) = &config.output.failures_path {
        if let Err(source) = output::write_failures(&result, failures_path, config.output.pretty) {
            tracing::error!("Failed to write {}: {}", failures_path.display(), source);
            return Err(TrawlError::Sink {
                source,
                result: Box::new(result),
            });
        }
    }

    Ok(result)
}
