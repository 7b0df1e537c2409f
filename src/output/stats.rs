//! Run summary for the command line

use crate::crawler::JobStatus;
use crate::output::result::{CrawlResult, FailureKind};
use std::collections::BTreeMap;

/// Totals derived from a crawl result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlStatistics {
    pub jobs: usize,
    pub jobs_done: usize,
    pub jobs_failed: usize,
    pub records: usize,
    pub failures_by_kind: BTreeMap<FailureKind, usize>,
}

pub fn collect_statistics(result: &CrawlResult) -> CrawlStatistics {
    let mut failures_by_kind = BTreeMap::new();
    for failure in &result.failures {
        *failures_by_kind.entry(failure.kind).or_insert(0) += 1;
    }

    CrawlStatistics {
        jobs: result.jobs.len(),
        jobs_done: result.jobs_with_status(JobStatus::Done),
        jobs_failed: result.jobs_with_status(JobStatus::Failed),
        records: result.records.len(),
        failures_by_kind,
    }
}

/// Prints a human-readable summary of a run
pub fn print_summary(result: &CrawlResult) {
    let stats = collect_statistics(result);

    println!("=== Crawl Summary ===\n");
    println!("Jobs: {} ({} done, {} failed)", stats.jobs, stats.jobs_done, stats.jobs_failed);
    println!("Records: {}", stats.records);

    if !result.jobs.is_empty() {
        println!("\nPer start URL:");
        for job in &result.jobs {
            println!("  [{}] {} ({} records)", job.status, job.start_url, job.records);
        }
    }

    if !stats.failures_by_kind.is_empty() {
        println!("\nFailures by kind:");
        for (kind, count) in &stats.failures_by_kind {
            println!("  {}: {}", kind, count);
        }

        println!("\nFailures:");
        for failure in &result.failures {
            println!("  {} at {}: {}", failure.start_url, failure.failed_url, failure.message);
            if let Some(diagnostic) = &failure.diagnostic {
                println!("    diagnostic: {}", diagnostic.display());
            }
        }
    }
}
