use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration structure for Trawl
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub render: RenderConfig,
    pub output: OutputConfig,
    /// Extraction rules, in output order
    #[serde(default)]
    pub fields: Vec<FieldEntry>,
}

/// Crawl loop configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// One crawl job is created per start URL
    pub start_urls: Vec<String>,

    /// CSS selector for the "next page" link; pagination is disabled when unset
    #[serde(default)]
    pub pagination_selector: Option<String>,

    /// Attribute of the "next page" element holding its link
    #[serde(default = "default_pagination_attribute")]
    pub pagination_attribute: String,

    /// Maximum number of attempts for one page
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Fixed delay between attempts (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Timeout handed to the render engine for each page (milliseconds)
    #[serde(default = "default_page_timeout_ms")]
    pub page_timeout_ms: u64,

    /// Number of jobs allowed to run at the same time
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: u32,

    /// Optional cap on pages visited per start URL
    #[serde(default)]
    pub max_pages_per_job: Option<u32>,

    /// Optional deadline for the whole run (seconds)
    #[serde(default)]
    pub run_deadline_secs: Option<u64>,
}

/// Which render engine turns URLs into documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Plain HTTP fetch and parse, no JavaScript
    #[default]
    Static,
    /// Headless Chrome (requires the `browser` feature)
    Browser,
}

/// Render engine configuration, passed opaquely to the engine
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RenderConfig {
    #[serde(default)]
    pub engine: EngineKind,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Proxy URL for all requests
    #[serde(default)]
    pub proxy: Option<String>,

    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Selector that must be present before a page counts as ready
    #[serde(default)]
    pub wait_for: Option<String>,

    /// Scroll to the bottom until the page stops growing (browser only)
    #[serde(default)]
    pub auto_scroll: bool,

    /// Pause after each scroll step (milliseconds)
    #[serde(default = "default_scroll_pause_ms")]
    pub scroll_pause_ms: u64,

    /// Upper bound on scroll steps per page
    #[serde(default = "default_max_scrolls")]
    pub max_scrolls: u32,

    /// Directory for failure screenshots (browser only)
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,

    #[serde(default = "default_headless")]
    pub headless: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            user_agent: default_user_agent(),
            proxy: None,
            headers: BTreeMap::new(),
            wait_for: None,
            auto_scroll: false,
            scroll_pause_ms: default_scroll_pause_ms(),
            max_scrolls: default_max_scrolls(),
            screenshot_dir: default_screenshot_dir(),
            headless: default_headless(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the JSON records file
    pub path: PathBuf,

    /// Pretty-print the JSON output
    #[serde(default = "default_pretty")]
    pub pretty: bool,

    /// Optional path for the failure diagnostics report
    #[serde(default)]
    pub failures_path: Option<PathBuf>,
}

/// One extraction rule as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct FieldEntry {
    /// Output field name
    pub name: String,

    /// CSS selector
    pub selector: String,

    /// `"text"` for visible text, anything else names an attribute
    #[serde(default = "default_attribute")]
    pub attribute: String,

    /// Keep every match instead of only the first
    #[serde(default)]
    pub multiple: bool,
}

fn default_pagination_attribute() -> String {
    "href".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    5000
}

fn default_page_timeout_ms() -> u64 {
    30_000
}

fn default_max_concurrent_jobs() -> u32 {
    1
}

fn default_user_agent() -> String {
    format!("Mozilla/5.0 (compatible; trawl/{})", env!("CARGO_PKG_VERSION"))
}

fn default_scroll_pause_ms() -> u64 {
    1000
}

fn default_max_scrolls() -> u32 {
    10
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_headless() -> bool {
    true
}

fn default_pretty() -> bool {
    true
}

fn default_attribute() -> String {
    "text".to_string()
}
