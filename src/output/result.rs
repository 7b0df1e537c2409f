//! Crawl result and failure diagnostics

use crate::crawler::{JobOutcome, JobStatus};
use crate::extract::Record;
use crate::FetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Classified reason a job ended in FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FailureKind {
    /// Transient failures persisted through every attempt
    FetchTransient,

    /// A non-retryable fetch failure
    FetchFatal,

    /// The render engine never satisfied its readiness contract
    RenderFailure,

    /// The run deadline passed or the run was cancelled
    Cancelled,

    /// The render session could not be opened
    SessionFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::FetchTransient => "FetchTransient",
            Self::FetchFatal => "FetchFatal",
            Self::RenderFailure => "RenderFailure",
            Self::Cancelled => "Cancelled",
            Self::SessionFailure => "SessionFailure",
        };
        write!(f, "{}", s)
    }
}

/// Diagnostic for one failed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlFailure {
    /// Start URL of the failed job
    pub start_url: String,

    /// Page the job was on when it failed
    pub failed_url: String,

    pub kind: FailureKind,

    pub message: String,

    /// Attempts made at the failing page
    pub attempts: u32,

    /// Screenshot or other artifact captured by the render engine
    pub diagnostic: Option<PathBuf>,

    pub failed_at: DateTime<Utc>,
}

impl CrawlFailure {
    pub fn new(
        start_url: impl Into<String>,
        failed_url: impl Into<String>,
        kind: FailureKind,
        message: impl Into<String>,
        attempts: u32,
        diagnostic: Option<PathBuf>,
    ) -> Self {
        Self {
            start_url: start_url.into(),
            failed_url: failed_url.into(),
            kind,
            message: message.into(),
            attempts,
            diagnostic,
            failed_at: Utc::now(),
        }
    }

    /// Builds the diagnostic for a render failure
    pub fn from_fetch_error(
        start_url: &str,
        failed_url: &str,
        error: &FetchError,
        attempts: u32,
        diagnostic: Option<PathBuf>,
    ) -> Self {
        Self::new(
            start_url,
            failed_url,
            error.kind(),
            error.to_string(),
            attempts,
            diagnostic,
        )
    }
}

/// Per-job line in the result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobSummary {
    pub start_url: String,
    pub status: JobStatus,
    pub records: usize,
}

/// Everything one run produced
///
/// Records are ordered by start URL position in the configuration, then by
/// page-visitation order within each job.
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    pub records: Vec<Record>,
    pub failures: Vec<CrawlFailure>,
    pub jobs: Vec<JobSummary>,
}

impl CrawlResult {
    /// Folds finished jobs into a result in start URL order
    pub fn from_outcomes(mut outcomes: Vec<JobOutcome>) -> Self {
        outcomes.sort_by_key(|outcome| outcome.index);

        let mut result = Self::default();
        for outcome in outcomes {
            result.jobs.push(JobSummary {
                start_url: outcome.start_url.to_string(),
                status: outcome.status,
                records: outcome.records.len(),
            });
            result.records.extend(outcome.records);
            if let Some(failure) = outcome.failure {
                result.failures.push(failure);
            }
        }

        result
    }

    pub fn jobs_with_status(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|job| job.status == status).count()
    }

    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}
