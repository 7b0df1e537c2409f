use crate::config::types::{Config, CrawlerConfig, EngineKind, OutputConfig, RenderConfig};
use crate::extract::ExtractionRuleSet;
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_render_config(&config.render)?;
    validate_output_config(&config.output)?;
    ExtractionRuleSet::from_entries(&config.fields)?;
    Ok(())
}

/// Parses and checks every start URL
///
/// Used by validation and again by the controller, so both agree on what a
/// start URL is.
pub fn parse_start_urls(urls: &[String]) -> Result<Vec<Url>, ConfigError> {
    if urls.is_empty() {
        return Err(ConfigError::Validation(
            "start-urls must contain at least one URL".to_string(),
        ));
    }

    urls.iter()
        .map(|raw| {
            let url = Url::parse(raw.trim())
                .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", raw, e)))?;

            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(ConfigError::InvalidUrl(format!(
                    "Start URL '{}' must use http or https",
                    raw
                )));
            }

            Ok(url)
        })
        .collect()
}

/// Compiles a standalone CSS selector from the config
pub fn parse_selector(selector: &str) -> Result<Selector, ConfigError> {
    if selector.trim().is_empty() {
        return Err(ConfigError::InvalidSelector {
            selector: selector.to_string(),
            reason: "selector cannot be empty".to_string(),
        });
    }

    Selector::parse(selector).map_err(|e| ConfigError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    parse_start_urls(&config.start_urls)?;

    if let Some(selector) = &config.pagination_selector {
        parse_selector(selector)?;
    }

    if config.pagination_attribute.trim().is_empty() {
        return Err(ConfigError::Validation(
            "pagination-attribute cannot be empty".to_string(),
        ));
    }

    if config.max_retries < 1 || config.max_retries > 20 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be between 1 and 20, got {}",
            config.max_retries
        )));
    }

    if config.page_timeout_ms < 1 {
        return Err(ConfigError::Validation(
            "page-timeout-ms must be >= 1".to_string(),
        ));
    }

    if config.max_concurrent_jobs < 1 || config.max_concurrent_jobs > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-jobs must be between 1 and 64, got {}",
            config.max_concurrent_jobs
        )));
    }

    if config.max_pages_per_job == Some(0) {
        return Err(ConfigError::Validation(
            "max-pages-per-job must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

fn validate_render_config(config: &RenderConfig) -> Result<(), ConfigError> {
    #[cfg(not(feature = "browser"))]
    if config.engine == EngineKind::Browser {
        return Err(ConfigError::UnsupportedEngine(
            "browser (rebuild with `--features browser`)".to_string(),
        ));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if let Some(proxy) = &config.proxy {
        Url::parse(proxy)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid proxy '{}': {}", proxy, e)))?;
    }

    for (name, value) in &config.headers {
        reqwest::header::HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
            ConfigError::Validation(format!("Invalid header name '{}'", name))
        })?;
        reqwest::header::HeaderValue::from_str(value).map_err(|_| {
            ConfigError::Validation(format!("Invalid value for header '{}'", name))
        })?;
    }

    if let Some(selector) = &config.wait_for {
        parse_selector(selector)?;
    }

    if config.engine == EngineKind::Browser && config.auto_scroll && config.max_scrolls == 0 {
        return Err(ConfigError::Validation(
            "max-scrolls must be >= 1 when auto-scroll is enabled".to_string(),
        ));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output path cannot be empty".to_string(),
        ));
    }

    if let Some(failures) = &config.failures_path {
        if failures == &config.path {
            return Err(ConfigError::Validation(
                "failures-path must differ from the output path".to_string(),
            ));
        }
    }

    Ok(())
}
