//! Crawler module for paginated crawl jobs
//!
//! This module contains the crawl control logic, including:
//! - Per-job state and the visited-set cycle guard
//! - Bounded retry with cancellation
//! - "Next page" resolution
//! - The controller that runs jobs on a bounded pool

mod coordinator;
mod job;
mod pagination;
mod retry;

pub use coordinator::Controller;
pub use job::{visit_key, CrawlJob, JobOutcome, JobStatus};
pub use pagination::{resolve_next, PaginationRule};
pub use retry::{render_with_retry, AttemptError, RetryPolicy};
