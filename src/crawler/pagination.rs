//! "Next page" discovery for paginated listings

use crate::config::validation::parse_selector;
use crate::config::CrawlerConfig;
use crate::render::PageSnapshot;
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Where to find the "next page" link
#[derive(Debug, Clone)]
pub struct PaginationRule {
    selector: Selector,
    attribute: String,
}

impl PaginationRule {
    pub fn new(selector: &str, attribute: &str) -> Result<Self, ConfigError> {
        let attribute = attribute.trim();
        if attribute.is_empty() {
            return Err(ConfigError::Validation(
                "pagination-attribute cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            selector: parse_selector(selector)?,
            attribute: attribute.to_ascii_lowercase(),
        })
    }

    /// Builds the rule from config; None when pagination is disabled
    pub fn from_config(config: &CrawlerConfig) -> Result<Option<Self>, ConfigError> {
        config
            .pagination_selector
            .as_deref()
            .map(|selector| Self::new(selector, &config.pagination_attribute))
            .transpose()
    }
}

/// Finds the next page to visit
///
/// Reads the link attribute of the first element matching the rule and
/// resolves it against the snapshot's base URL. Returns None when pagination
/// is disabled, nothing matches, the attribute is missing or empty, or the
/// link does not resolve to an http(s) URL. Cycle detection is left to the
/// caller.
pub fn resolve_next(snapshot: &PageSnapshot, rule: Option<&PaginationRule>) -> Option<Url> {
    let rule = rule?;
    let element = snapshot.select(&rule.selector).next()?;
    let raw = element.value().attr(&rule.attribute)?.trim();

    if raw.is_empty() {
        return None;
    }

    match snapshot.base_url().join(raw) {
        Ok(next) if next.scheme() == "http" || next.scheme() == "https" => Some(next),
        Ok(next) => {
            tracing::debug!("Ignoring non-HTTP next link {}", next);
            None
        }
        Err(e) => {
            tracing::debug!("Ignoring unparsable next link '{}': {}", raw, e);
            None
        }
    }
}
