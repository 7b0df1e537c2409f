//! Bounded retry around page renders
//!
//! Only retryable failures (transient fetch errors and readiness failures)
//! are attempted again, after a fixed delay. The cancellation signal is
//! checked before every attempt and raced against both the render and the
//! delay.

use crate::config::CrawlerConfig;
use crate::crawler::job::CrawlJob;
use crate::render::{PageSource, RenderSession};
use crate::FetchError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// How many times a page is attempted and how long to wait in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first
    pub max_attempts: u32,

    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.retry_delay_ms))
    }

    /// Returns true if `error` on attempt number `attempt` earns another try
    pub fn should_retry(&self, error: &FetchError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }
}

/// Why a page could not be rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// The last error once retries were exhausted, or a non-retryable one
    Failed { error: FetchError, attempts: u32 },

    /// The run was cancelled before the page rendered
    Cancelled { attempts: u32 },
}

/// Renders the job's current page under `policy`
///
/// Every attempt is counted on the job (`attempts_for_current`).
///
/// # Returns
///
/// * `Ok(PageSource)` - An attempt succeeded
/// * `Err(AttemptError::Failed)` - A fatal error, or the final retryable one
/// * `Err(AttemptError::Cancelled)` - Cancellation was observed first
pub async fn render_with_retry(
    session: &mut dyn RenderSession,
    job: &mut CrawlJob,
    url: &Url,
    timeout: Duration,
    policy: &RetryPolicy,
    cancel: &CancellationToken,
) -> Result<PageSource, AttemptError> {
    loop {
        if cancel.is_cancelled() {
            return Err(AttemptError::Cancelled {
                attempts: job.attempts_for_current(),
            });
        }

        let attempt = job.record_attempt();

        let result = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(AttemptError::Cancelled { attempts: attempt });
            }
            result = session.render(url, timeout) => result,
        };

        match result {
            Ok(source) => {
                if attempt > 1 {
                    tracing::info!("{} succeeded on attempt {}", url, attempt);
                }
                return Ok(source);
            }
            Err(error) if policy.should_retry(&error, attempt) => {
                tracing::warn!(
                    "Attempt {}/{} failed: {}; retrying in {:?}",
                    attempt,
                    policy.max_attempts,
                    error,
                    policy.delay
                );

                tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err(AttemptError::Cancelled { attempts: attempt });
                    }
                    _ = tokio::time::sleep(policy.delay) => {}
                }
            }
            Err(error) => {
                tracing::warn!("Giving up on {} after {} attempt(s): {}", url, attempt, error);
                return Err(AttemptError::Failed {
                    error,
                    attempts: attempt,
                });
            }
        }
    }
}
