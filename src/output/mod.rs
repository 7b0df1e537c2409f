//! Output module for crawl results
//!
//! This module handles:
//! - Collecting job outcomes into an ordered crawl result
//! - Writing records to a JSON array file
//! - Writing failure diagnostics and printing run summaries

mod result;
mod sink;
pub mod stats;

pub use result::{CrawlFailure, CrawlResult, FailureKind, JobSummary};
pub use sink::{write_failures, JsonSink, OutputSink};
pub use stats::{collect_statistics, print_summary, CrawlStatistics};
