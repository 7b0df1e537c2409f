//! Configuration module for Trawl
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Everything is checked once at load time; a loaded [`Config`] is never re-read
//! during a run.
//!
//! # Example
//!
//! ```no_run
//! use trawl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("trawl.toml")).unwrap();
//! println!("Start URLs: {}", config.crawler.start_urls.len());
//! ```

mod parser;
mod types;
pub(crate) mod validation;

// Re-export types
pub use types::{Config, CrawlerConfig, EngineKind, FieldEntry, OutputConfig, RenderConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
