//! Crawl controller - runs one job per start URL
//!
//! Each job owns a private render session and walks its pagination chain
//! page by page: render with retry, extract one record, follow the next link.
//! Jobs run on a bounded pool and never share visited sets, records, or
//! sessions. The controller always produces a [`CrawlResult`]; page and job
//! failures end up as diagnostics inside it.

use crate::config::validation::parse_start_urls;
use crate::config::Config;
use crate::crawler::job::{visit_key, CrawlJob, JobOutcome};
use crate::crawler::pagination::{resolve_next, PaginationRule};
use crate::crawler::retry::{render_with_retry, AttemptError, RetryPolicy};
use crate::extract::{extract, ExtractionRuleSet, Record};
use crate::output::{CrawlFailure, CrawlResult, FailureKind};
use crate::render::{PageSnapshot, PageSource, RenderEngine, RenderSession};
use crate::ConfigError;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Drives every crawl job of a run
pub struct Controller {
    engine: Arc<dyn RenderEngine>,
    rules: Arc<ExtractionRuleSet>,
    pagination: Option<PaginationRule>,
    start_urls: Vec<Url>,
    retry: RetryPolicy,
    page_timeout: Duration,
    max_concurrent_jobs: usize,
    max_pages_per_job: Option<u32>,
    run_deadline: Option<Duration>,
}

impl Controller {
    /// Creates a controller for `config` using `engine` to render pages
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the start URLs, extraction rules, or
    /// pagination rule are invalid.
    pub fn new(config: &Config, engine: Arc<dyn RenderEngine>) -> Result<Self, ConfigError> {
        let crawler = &config.crawler;

        Ok(Self {
            engine,
            rules: Arc::new(ExtractionRuleSet::from_entries(&config.fields)?),
            pagination: PaginationRule::from_config(crawler)?,
            start_urls: parse_start_urls(&crawler.start_urls)?,
            retry: RetryPolicy::from_config(crawler),
            page_timeout: Duration::from_millis(crawler.page_timeout_ms),
            max_concurrent_jobs: crawler.max_concurrent_jobs.max(1) as usize,
            max_pages_per_job: crawler.max_pages_per_job,
            run_deadline: crawler.run_deadline_secs.map(Duration::from_secs),
        })
    }

    /// Overrides the retry policy
    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Overrides the number of jobs that may run at once
    pub fn max_concurrent_jobs(mut self, jobs: usize) -> Self {
        self.max_concurrent_jobs = jobs.max(1);
        self
    }

    /// Overrides the run deadline
    pub fn run_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.run_deadline = deadline;
        self
    }

    pub fn start_urls(&self) -> &[Url] {
        &self.start_urls
    }

    /// Runs every job to a terminal status
    ///
    /// Cancelling `cancel` (or reaching the configured run deadline) ends the
    /// jobs still running as FAILED with a `Cancelled` diagnostic; records
    /// they collected before that are kept.
    pub async fn run(&self, cancel: CancellationToken) -> CrawlResult {
        let cancel = cancel.child_token();
        let deadline = self.run_deadline.map(|limit| {
            let token = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(limit).await;
                tracing::warn!("Run deadline of {:?} reached, cancelling remaining jobs", limit);
                token.cancel();
            })
        });

        tracing::info!(
            "Starting {} job(s) with {} engine, up to {} at once",
            self.start_urls.len(),
            self.engine.name(),
            self.max_concurrent_jobs
        );
        let start_time = tokio::time::Instant::now();

        let outcomes: Vec<JobOutcome> = stream::iter(self.start_urls.iter().cloned().enumerate())
            .map(|(index, start_url)| self.run_job(CrawlJob::new(index, start_url), &cancel))
            .buffer_unordered(self.max_concurrent_jobs)
            .collect()
            .await;

        if let Some(handle) = deadline {
            handle.abort();
        }

        let result = CrawlResult::from_outcomes(outcomes);
        tracing::info!(
            "Crawl finished in {:.2?}: {} records, {} failed job(s)",
            start_time.elapsed(),
            result.records.len(),
            result.failures.len()
        );

        result
    }

    /// Runs one job inside its own render session
    async fn run_job(&self, mut job: CrawlJob, cancel: &CancellationToken) -> JobOutcome {
        tracing::info!("Job {} starting at {}", job.index(), job.start_url());

        let mut session = match self.engine.open_session().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("Could not open render session for {}: {}", job.start_url(), e);
                let start = job.start_url().to_string();
                job.fail(CrawlFailure::new(
                    start.as_str(),
                    start.as_str(),
                    FailureKind::SessionFailure,
                    e.to_string(),
                    0,
                    None,
                ));
                return job.into_outcome();
            }
        };

        self.drive(&mut job, session.as_mut(), cancel).await;

        if let Err(e) = session.close().await {
            tracing::warn!("Error closing render session for {}: {}", job.start_url(), e);
        }

        tracing::info!(
            "Job {} {} with {} record(s)",
            job.index(),
            job.status(),
            job.records().len()
        );
        job.into_outcome()
    }

    /// Walks the pagination chain until the job reaches a terminal status
    async fn drive(&self, job: &mut CrawlJob, session: &mut dyn RenderSession, cancel: &CancellationToken) {
        while let Some(url) = job.current_url().cloned() {
            tracing::debug!("Job {} rendering {}", job.index(), url);

            let source = match render_with_retry(
                session,
                job,
                &url,
                self.page_timeout,
                &self.retry,
                cancel,
            )
            .await
            {
                Ok(source) => source,
                Err(AttemptError::Cancelled { attempts }) => {
                    tracing::warn!("Job {} cancelled at {}", job.index(), url);
                    let failure = CrawlFailure::new(
                        job.start_url().as_str(),
                        url.as_str(),
                        FailureKind::Cancelled,
                        "run cancelled before the page rendered",
                        attempts,
                        None,
                    );
                    job.fail(failure);
                    return;
                }
                Err(AttemptError::Failed { error, attempts }) => {
                    tracing::error!("Job {} failed at {}: {}", job.index(), url, error);
                    let diagnostic = session.capture_diagnostic(&format!("job{}_failure", job.index())).await;
                    let failure = CrawlFailure::from_fetch_error(
                        job.start_url().as_str(),
                        url.as_str(),
                        &error,
                        attempts,
                        diagnostic,
                    );
                    job.fail(failure);
                    return;
                }
            };

            let redirected = visit_key(&source.final_url) != visit_key(&url);
            if !job.mark_visited(&source.final_url) && redirected {
                tracing::info!(
                    "Job {} stopping: {} redirected to already visited {}",
                    job.index(),
                    url,
                    source.final_url
                );
                job.finish();
                return;
            }

            let (record, next) = self.process_page(&source);
            job.push_record(record);

            if let Some(limit) = self.max_pages_per_job {
                if job.pages_visited() >= limit as usize {
                    tracing::info!("Job {} reached its page limit of {}", job.index(), limit);
                    job.finish();
                    return;
                }
            }

            let Some(next) = next else {
                tracing::debug!("Job {} has no next page after {}", job.index(), source.final_url);
                job.finish();
                return;
            };

            if cancel.is_cancelled() {
                let failure = CrawlFailure::new(
                    job.start_url().as_str(),
                    next.as_str(),
                    FailureKind::Cancelled,
                    "run cancelled before the next page",
                    0,
                    None,
                );
                job.fail(failure);
                return;
            }

            if !job.advance(next.clone()) {
                tracing::info!("Job {} stopping: {} was already visited", job.index(), next);
                job.finish();
                return;
            }
        }
    }

    /// Extracts the record and next link of a rendered page
    ///
    /// The parsed document only lives inside this call.
    fn process_page(&self, source: &PageSource) -> (Record, Option<Url>) {
        let snapshot = PageSnapshot::parse(source);
        let record = extract(&snapshot, &self.rules);
        let next = resolve_next(&snapshot, self.pagination.as_ref());
        (record, next)
    }
}
