//! Controller scenarios on a paused clock

use crate::common::{config, fatal, listing, transient, ScriptedEngine, Step};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use trawl::crawler::RetryPolicy;
use trawl::{Controller, FailureKind, JobStatus};

const LIST: &str = "https://shop.test/list";
const PAGE_2: &str = "https://shop.test/list?page=2";
const PAGE_3: &str = "https://shop.test/list?page=3";

fn assert_elapsed(actual: Duration, expected: Duration) {
    assert!(
        actual >= expected && actual < expected + Duration::from_millis(100),
        "expected about {:?}, got {:?}",
        expected,
        actual
    );
}

fn titles(result: &trawl::CrawlResult) -> Vec<String> {
    result
        .records
        .iter()
        .filter_map(|r| r.get("title").and_then(|v| v.as_str()).map(str::to_string))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_transient_then_success_waits_one_delay() {
    let engine = ScriptedEngine::new()
        .fail(LIST, transient(LIST))
        .page(LIST, &listing("Only", None));
    let stats = engine.stats.clone();
    let config = config(&[LIST], "");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let result = controller.run(CancellationToken::new()).await;

    let attempts = stats.attempts_for(LIST);
    assert_eq!(attempts.len(), 2);
    assert_elapsed(attempts[1] - attempts[0], Duration::from_secs(5));

    assert_eq!(titles(&result), vec!["Only"]);
    assert!(result.failures.is_empty());
    assert_eq!(result.jobs[0].status, JobStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_fails_without_retry() {
    let engine = ScriptedEngine::new().fail(LIST, fatal(LIST));
    let stats = engine.stats.clone();
    let config = config(&[LIST], "");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let start = Instant::now();
    let result = controller.run(CancellationToken::new()).await;

    assert_eq!(stats.attempts_for(LIST).len(), 1);
    assert_elapsed(start.elapsed(), Duration::ZERO);
    assert!(result.records.is_empty());

    let failure = &result.failures[0];
    assert_eq!(failure.kind, FailureKind::FetchFatal);
    assert_eq!(failure.attempts, 1);
    assert_eq!(failure.failed_url, LIST);
    assert_eq!(failure.diagnostic, Some(PathBuf::from("scripted/job0_failure.png")));
    assert_eq!(result.jobs[0].status, JobStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_keep_earlier_records() {
    let engine = ScriptedEngine::new()
        .page(LIST, &listing("One", Some("?page=2")))
        .fail(PAGE_2, transient(PAGE_2))
        .fail(PAGE_2, transient(PAGE_2))
        .fail(PAGE_2, transient(PAGE_2))
        .page(PAGE_2, &listing("Never", None));
    let stats = engine.stats.clone();
    let config = config(&[LIST], "");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let start = Instant::now();
    let result = controller.run(CancellationToken::new()).await;

    // Three attempts, two delays
    assert_eq!(stats.attempts_for(PAGE_2).len(), 3);
    assert_elapsed(start.elapsed(), Duration::from_secs(10));

    assert_eq!(titles(&result), vec!["One"]);
    assert_eq!(result.jobs[0].status, JobStatus::Failed);

    let failure = &result.failures[0];
    assert_eq!(failure.kind, FailureKind::FetchTransient);
    assert_eq!(failure.attempts, 3);
    assert_eq!(failure.start_url, LIST);
    assert_eq!(failure.failed_url, PAGE_2);
}

#[tokio::test(start_paused = true)]
async fn test_render_failure_is_retried() {
    let engine = ScriptedEngine::new()
        .fail(
            LIST,
            trawl::FetchError::Render {
                url: LIST.to_string(),
                reason: "wait-for selector never appeared".to_string(),
            },
        )
        .page(LIST, &listing("Ready", None));
    let config = config(&[LIST], "retry-delay-ms = 250");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let start = Instant::now();
    let result = controller.run(CancellationToken::new()).await;

    assert_elapsed(start.elapsed(), Duration::from_millis(250));
    assert_eq!(titles(&result), vec!["Ready"]);
}

#[tokio::test(start_paused = true)]
async fn test_no_next_element_yields_one_record() {
    let engine = ScriptedEngine::new().page(LIST, &listing("Single", None));
    let config = config(&[LIST], "");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let result = controller.run(CancellationToken::new()).await;

    assert_eq!(result.records.len(), 1);
    assert_eq!(result.records[0].url(), Some(LIST));
    assert_eq!(result.jobs[0].status, JobStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn test_follows_pagination_in_order() {
    let engine = ScriptedEngine::new()
        .page(LIST, &listing("One", Some("?page=2")))
        .page(PAGE_2, &listing("Two", Some("?page=3")))
        .page(PAGE_3, &listing("Three", None));
    let config = config(&[LIST], "");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let result = controller.run(CancellationToken::new()).await;

    assert_eq!(titles(&result), vec!["One", "Two", "Three"]);
    let urls: Vec<&str> = result.records.iter().filter_map(|r| r.url()).collect();
    assert_eq!(urls, vec![LIST, PAGE_2, PAGE_3]);
}

#[tokio::test(start_paused = true)]
async fn test_next_link_to_visited_page_ends_done() {
    let engine = ScriptedEngine::new()
        .page(LIST, &listing("One", Some("?page=2")))
        .page(PAGE_2, &listing("Two", Some("/list#top")));
    let stats = engine.stats.clone();
    let config = config(&[LIST], "");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let result = controller.run(CancellationToken::new()).await;

    assert_eq!(titles(&result), vec!["One", "Two"]);
    assert_eq!(stats.total_attempts(), 2);
    assert_eq!(result.jobs[0].status, JobStatus::Done);
    assert!(result.failures.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_redirect_target_counts_as_visited() {
    let start = "https://shop.test/";
    let engine = ScriptedEngine::new().on(
        start,
        Step::Redirect {
            to: LIST.to_string(),
            html: listing("Landing", Some("/list")),
        },
    );
    let stats = engine.stats.clone();
    let config = config(&[start], "");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let result = controller.run(CancellationToken::new()).await;

    assert_eq!(stats.total_attempts(), 1);
    assert_eq!(result.records[0].url(), Some(LIST));
    assert_eq!(result.jobs[0].status, JobStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn test_redirect_back_to_visited_page_adds_no_record() {
    let engine = ScriptedEngine::new()
        .page(LIST, &listing("One", Some("?page=2")))
        .on(
            PAGE_2,
            Step::Redirect {
                to: LIST.to_string(),
                html: listing("One again", Some("?page=2")),
            },
        );
    let stats = engine.stats.clone();
    let config = config(&[LIST], "");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let result = controller.run(CancellationToken::new()).await;

    let urls: Vec<&str> = result.records.iter().filter_map(|r| r.url()).collect();
    assert_eq!(urls, vec![LIST]);
    assert_eq!(stats.total_attempts(), 2);
    assert_eq!(result.jobs[0].status, JobStatus::Done);
    assert!(result.failures.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_pagination_step() {
    let cancel = CancellationToken::new();
    let engine = ScriptedEngine::new()
        .on(
            LIST,
            Step::CancelDuring {
                token: cancel.clone(),
                html: listing("One", Some("?page=2")),
            },
        )
        .page(PAGE_2, &listing("Two", None));
    let stats = engine.stats.clone();
    let config = config(&[LIST], "");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let result = controller.run(cancel).await;

    // The page that rendered is kept; the next one is never requested
    assert_eq!(titles(&result), vec!["One"]);
    assert!(stats.attempts_for(PAGE_2).is_empty());

    let failure = &result.failures[0];
    assert_eq!(failure.kind, FailureKind::Cancelled);
    assert_eq!(failure.failed_url, PAGE_2);
    assert_eq!(failure.attempts, 0);
    assert_eq!(result.jobs[0].status, JobStatus::Failed);
    assert_eq!(stats.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_page_limit_ends_job_done() {
    let engine = ScriptedEngine::new()
        .page(LIST, &listing("One", Some("?page=2")))
        .page(PAGE_2, &listing("Two", Some("?page=3")))
        .page(PAGE_3, &listing("Three", None));
    let stats = engine.stats.clone();
    let config = config(&[LIST], "max-pages-per-job = 2");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let result = controller.run(CancellationToken::new()).await;

    assert_eq!(titles(&result), vec!["One", "Two"]);
    assert!(stats.attempts_for(PAGE_3).is_empty());
    assert_eq!(result.jobs[0].status, JobStatus::Done);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_before_start() {
    let engine = ScriptedEngine::new()
        .page(LIST, &listing("One", None))
        .page(PAGE_2, &listing("Two", None));
    let stats = engine.stats.clone();
    let config = config(&[LIST, PAGE_2], "");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let result = controller.run(cancel).await;

    assert_eq!(stats.total_attempts(), 0);
    assert!(result.records.is_empty());
    assert_eq!(result.failures.len(), 2);
    assert!(result.failures.iter().all(|f| f.kind == FailureKind::Cancelled));
    assert_eq!(stats.opened(), stats.closed());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_interrupts_retry_delay() {
    let engine = ScriptedEngine::new()
        .page(LIST, &listing("One", Some("?page=2")))
        .fail(PAGE_2, transient(PAGE_2))
        .page(PAGE_2, &listing("Two", None));
    let stats = engine.stats.clone();
    let config = config(&[LIST], "retry-delay-ms = 60000");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let start = Instant::now();
    let result = controller.run(cancel).await;

    assert_elapsed(start.elapsed(), Duration::from_secs(1));
    assert_eq!(titles(&result), vec!["One"]);
    assert_eq!(result.failures[0].kind, FailureKind::Cancelled);
    assert_eq!(result.failures[0].failed_url, PAGE_2);
    assert_eq!(result.failures[0].attempts, 1);
    assert_eq!(stats.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_deadline_cancels_slow_render() {
    let engine = ScriptedEngine::new().on(
        LIST,
        Step::Slow(Duration::from_secs(60), listing("Late", None)),
    );
    let stats = engine.stats.clone();
    let config = config(&[LIST], "run-deadline-secs = 10\npage-timeout-ms = 120000");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let start = Instant::now();
    let result = controller.run(CancellationToken::new()).await;

    assert_elapsed(start.elapsed(), Duration::from_secs(10));
    assert!(result.records.is_empty());
    assert_eq!(result.failures[0].kind, FailureKind::Cancelled);
    assert_eq!(result.jobs[0].status, JobStatus::Failed);
    assert_eq!(stats.opened(), 1);
    assert_eq!(stats.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_jobs_are_isolated_and_ordered() {
    let a = "https://a.test/";
    let b = "https://b.test/";
    let c = "https://c.test/";
    let engine = ScriptedEngine::new()
        .on(a, Step::Slow(Duration::from_secs(3), listing("A1", Some("/2"))))
        .page("https://a.test/2", &listing("A2", None))
        .fail(b, fatal(b))
        .on(c, Step::Slow(Duration::from_secs(1), listing("C1", None)));
    let stats = engine.stats.clone();
    let config = config(&[a, b, c], "max-concurrent-jobs = 3");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let result = controller.run(CancellationToken::new()).await;

    // C finishes first, but results follow configuration order
    assert_eq!(titles(&result), vec!["A1", "A2", "C1"]);
    let statuses: Vec<JobStatus> = result.jobs.iter().map(|j| j.status).collect();
    assert_eq!(statuses, vec![JobStatus::Done, JobStatus::Failed, JobStatus::Done]);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].start_url, b);

    assert_eq!(stats.opened(), 3);
    assert_eq!(stats.closed(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_is_bounded() {
    let urls = ["https://a.test/", "https://b.test/", "https://c.test/", "https://d.test/"];
    let mut engine = ScriptedEngine::new();
    for url in urls {
        engine = engine.on(url, Step::Slow(Duration::from_secs(2), listing(url, None)));
    }
    let config = config(&urls, "");
    let controller = Controller::new(&config, engine.into_arc())
        .unwrap()
        .max_concurrent_jobs(2);

    let start = Instant::now();
    let result = controller.run(CancellationToken::new()).await;

    // Two waves of two jobs
    assert_elapsed(start.elapsed(), Duration::from_secs(4));
    assert_eq!(result.records.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_session_open_failure_is_isolated() {
    let a = "https://a.test/";
    let b = "https://b.test/";
    let engine = ScriptedEngine::new()
        .page(a, &listing("A", None))
        .page(b, &listing("B", None))
        .fail_session(0);
    let stats = engine.stats.clone();
    let config = config(&[a, b], "");
    let controller = Controller::new(&config, engine.into_arc()).unwrap();

    let result = controller.run(CancellationToken::new()).await;

    assert_eq!(titles(&result), vec!["B"]);
    assert_eq!(result.failures[0].kind, FailureKind::SessionFailure);
    assert_eq!(result.failures[0].start_url, a);
    assert_eq!(stats.opened(), 1);
    assert_eq!(stats.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_custom_retry_policy() {
    let engine = ScriptedEngine::new()
        .fail(LIST, transient(LIST))
        .fail(LIST, transient(LIST))
        .page(LIST, &listing("Third time", None));
    let stats = engine.stats.clone();
    let config = config(&[LIST], "");
    let controller = Controller::new(&config, engine.into_arc())
        .unwrap()
        .retry_policy(RetryPolicy::new(2, Duration::from_millis(10)));

    let result = controller.run(CancellationToken::new()).await;

    assert_eq!(stats.attempts_for(LIST).len(), 2);
    assert!(result.records.is_empty());
    assert_eq!(result.failures[0].attempts, 2);
}
