//! Crawl job state for one start URL
//!
//! A job walks `Running -> Done` when pagination runs out and
//! `Running -> Failed` when a page cannot be rendered or the run is
//! cancelled. Both terminal states keep the records collected so far.

use crate::extract::Record;
use crate::output::CrawlFailure;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use url::Url;

/// Represents the current state of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Fetching, extracting, or following pagination
    Running,

    /// Pagination ended normally
    Done,

    /// A page failed or the run was cancelled
    Failed,
}

impl JobStatus {
    /// Returns true if this is a terminal state (no further processing needed)
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    /// Returns true if moving to `next` is a legal transition
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Done) | (Self::Running, Self::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Key used for the visited set: the URL without its fragment
pub fn visit_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.into()
}

/// Mutable state of one crawl job
#[derive(Debug)]
pub struct CrawlJob {
    index: usize,
    start_url: Url,
    current_url: Option<Url>,
    visited: HashSet<String>,
    attempts_for_current: u32,
    status: JobStatus,
    records: Vec<Record>,
    failure: Option<CrawlFailure>,
}

impl CrawlJob {
    /// Creates a running job positioned at its start URL
    pub fn new(index: usize, start_url: Url) -> Self {
        let mut visited = HashSet::new();
        visited.insert(visit_key(&start_url));

        Self {
            index,
            current_url: Some(start_url.clone()),
            start_url,
            visited,
            attempts_for_current: 0,
            status: JobStatus::Running,
            records: Vec::new(),
            failure: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn start_url(&self) -> &Url {
        &self.start_url
    }

    /// The page to fetch next, or None once the job is terminal
    pub fn current_url(&self) -> Option<&Url> {
        self.current_url.as_ref()
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn attempts_for_current(&self) -> u32 {
        self.attempts_for_current
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn pages_visited(&self) -> usize {
        self.records.len()
    }

    pub fn has_visited(&self, url: &Url) -> bool {
        self.visited.contains(&visit_key(url))
    }

    /// Counts one more attempt at the current page and returns the total
    pub fn record_attempt(&mut self) -> u32 {
        self.attempts_for_current += 1;
        self.attempts_for_current
    }

    /// Marks a URL as seen (e.g. the post-redirect URL of a page)
    ///
    /// Returns false if it was already marked.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(visit_key(url))
    }

    /// Appends the record of the page just processed
    pub fn push_record(&mut self, record: Record) {
        self.records.push(record);
    }

    /// Moves to the next page
    ///
    /// Returns false, leaving the job where it is, if `next` was already
    /// visited.
    pub fn advance(&mut self, next: Url) -> bool {
        if !self.visited.insert(visit_key(&next)) {
            return false;
        }

        self.current_url = Some(next);
        self.attempts_for_current = 0;
        true
    }

    /// Ends the job normally
    pub fn finish(&mut self) {
        if self.transition(JobStatus::Done) {
            self.current_url = None;
        }
    }

    /// Ends the job with a diagnostic
    pub fn fail(&mut self, failure: CrawlFailure) {
        if self.transition(JobStatus::Failed) {
            self.current_url = None;
            self.failure = Some(failure);
        }
    }

    fn transition(&mut self, next: JobStatus) -> bool {
        if !self.status.can_transition_to(next) {
            tracing::warn!(
                "Ignoring invalid job transition {} -> {} for {}",
                self.status,
                next,
                self.start_url
            );
            return false;
        }

        self.status = next;
        true
    }

    /// Consumes a terminal job
    pub fn into_outcome(self) -> JobOutcome {
        JobOutcome {
            index: self.index,
            start_url: self.start_url,
            status: self.status,
            records: self.records,
            failure: self.failure,
        }
    }
}

/// Everything a finished job contributes to the crawl result
#[derive(Debug, Clone)]
pub struct JobOutcome {
    /// Position of the start URL in the configuration
    pub index: usize,
    pub start_url: Url,
    pub status: JobStatus,
    /// Records in page-visitation order
    pub records: Vec<Record>,
    pub failure: Option<CrawlFailure>,
}
