//! End-to-end engine scenarios over a scripted in-memory fetcher.
//!
//! These run the real stage/worker/sequencer machinery; only the browser
//! is stubbed. Timers use tokio's paused clock, so the minutes-long retry
//! windows elapse instantly.

mod common;

use std::sync::Arc;

use common::{list_payload, StubFetcher};
use propharvest::engine::{run_stage, RowSink, Stage, Task, WorkerContext};
use propharvest::output::{dedupe_listings, write_adview_csv};
use propharvest::{
    AuditLog, CategorySpec, FetchError, HarvestConfig, HarvestConfigBuilder, Intent,
    Notifier, ProxyRecord, Segment, SinkConfig, CategoryLogger, PROPERTYGURU_DETAIL,
    PROPERTYGURU_LIST,
};

fn test_config(root: &std::path::Path) -> Arc<HarvestConfig> {
    Arc::new(
        HarvestConfigBuilder::new()
            .category(CategorySpec::new(Intent::Sale, Segment::Residential, 2))
            .proxies([ProxyRecord::new("10.0.0.1:8080"), ProxyRecord::new("10.0.0.2:8080")])
            .launch_stagger_step_secs(0)
            .output_root(root)
            .build()
            .expect("config"),
    )
}

struct Harness {
    _dir: tempfile::TempDir,
    config: Arc<HarvestConfig>,
    audit_dir: std::path::PathBuf,
    audit: Arc<AuditLog>,
    logger: Arc<CategoryLogger>,
    notifier: Arc<Notifier>,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(dir.path());
        let audit_dir = dir.path().join("audit");
        let audit = AuditLog::create(&audit_dir).expect("audit");
        let logger = CategoryLogger::create(&dir.path().join("logs")).expect("logger");
        let notifier = Arc::new(Notifier::new(SinkConfig::default()));
        Self {
            _dir: dir,
            config,
            audit_dir,
            audit,
            logger,
            notifier,
        }
    }

    fn ctx(&self, stage: &Arc<Stage>, sink: RowSink) -> WorkerContext {
        WorkerContext {
            config: Arc::clone(&self.config),
            stage: Arc::clone(stage),
            sink,
            audit: Arc::clone(&self.audit),
            logger: Arc::clone(&self.logger),
            notifier: Arc::clone(&self.notifier),
            payload_dir: self._dir.path().join("payloads"),
            detail_schema: &PROPERTYGURU_DETAIL,
            list_schema: &PROPERTYGURU_LIST,
        }
    }
}

/// Scenario 1: two list pages of 20 listings each, everything succeeds
/// first try; stage B gets 40 distinct URLs and the final CSV has 40 rows.
#[tokio::test(start_paused = true)]
async fn clean_run_produces_forty_final_rows() {
    let harness = Harness::new();
    let stub = StubFetcher::new(true);
    for page in 1..=2u32 {
        stub.script(
            &harness
                .config
                .list_page_url(Intent::Sale, Segment::Residential, page),
            Ok(list_payload(page, 20)),
        );
    }

    let stage_a = Stage::new("adlist");
    for page in 1..=2 {
        stage_a.submit(Task::list_page(Intent::Sale, Segment::Residential, page));
    }
    let sink_a = RowSink::listings();
    let stub_a = stub.clone();
    run_stage(2, harness.ctx(&stage_a, sink_a.clone()), move |_| stub_a.clone())
        .await
        .expect("stage A");

    let metrics = stage_a.metrics();
    assert_eq!(metrics.total, 2);
    assert_eq!(metrics.ok, 2);
    assert_eq!(metrics.completed, 2);
    assert_eq!(metrics.retried, 0);

    let listings = match &sink_a {
        RowSink::Listings(buffer) => dedupe_listings(std::mem::take(&mut *buffer.lock())),
        RowSink::Details(_) => unreachable!(),
    };
    assert_eq!(listings.len(), 40);

    let stage_b = Stage::new("adview");
    for listing in &listings {
        stage_b.submit(Task::detail_page(
            listing.url.clone(),
            listing.intent,
            listing.segment,
            Some(listing.listing_id.clone()),
        ));
    }
    let sink_b = RowSink::details();
    let stub_b = stub.clone();
    run_stage(2, harness.ctx(&stage_b, sink_b.clone()), move |_| stub_b.clone())
        .await
        .expect("stage B");

    assert_eq!(stage_b.metrics().total, 40);
    assert_eq!(stage_b.metrics().ok, 40);

    let details = match &sink_b {
        RowSink::Details(buffer) => std::mem::take(&mut *buffer.lock()),
        RowSink::Listings(_) => unreachable!(),
    };
    let csv_path = harness._dir.path().join("adview.csv");
    write_adview_csv(&csv_path, &details, &listings).expect("csv");
    let text = std::fs::read_to_string(&csv_path).expect("read csv");
    assert_eq!(text.lines().count(), 41, "header plus forty rows");
}

/// Scenario 2: a page fails twice and succeeds on attempt 3 after the two
/// timed backoff windows. Workers rotate on every failure.
#[tokio::test(start_paused = true)]
async fn two_failures_then_success_is_retried_through_the_delay_heap() {
    let harness = Harness::new();
    let url = harness
        .config
        .list_page_url(Intent::Sale, Segment::Residential, 1);
    let stub = StubFetcher::new(false);
    stub.script(&url, Err(FetchError::Timeout));
    stub.script(&url, Err(FetchError::Blocked));
    stub.script(&url, Ok(list_payload(1, 5)));

    let stage = Stage::new("adlist");
    stage.submit(Task::list_page(Intent::Sale, Segment::Residential, 1));
    let sink = RowSink::listings();
    let stub_w = stub.clone();
    run_stage(1, harness.ctx(&stage, sink.clone()), move |_| stub_w.clone())
        .await
        .expect("stage");

    let metrics = stage.metrics();
    assert_eq!(metrics.retried, 2);
    assert_eq!(metrics.ok, 1);
    assert_eq!(metrics.completed, 1);
    assert_eq!(metrics.deferred, 0);
    assert_eq!(stub.fetch_count(), 3);
    assert_eq!(stub.rotation_count(), 2, "session rotates on every failure");

    // Success after earlier failures keeps the first-failure timestamp in
    // the success audit line.
    let successes =
        std::fs::read_to_string(harness.audit_dir.join("successes.ndjson")).expect("audit");
    assert!(successes.contains("first_failure_unix"));
}

/// Scenario 3: a detail URL fails every attempt. It is deferred after the
/// primary attempts, swept once, and exhausted on the final-sweep failure
/// with an audit line.
#[tokio::test(start_paused = true)]
async fn exhausted_task_is_deferred_swept_and_audited() {
    let harness = Harness::new();
    let stub = StubFetcher::new(false);

    let stage = Stage::new("adview");
    stage.submit(Task::detail_page(
        "https://www.propertyguru.com.my/property-listing/doomed",
        Intent::Sale,
        Segment::Residential,
        Some("D1".to_string()),
    ));
    let sink = RowSink::details();
    let stub_w = stub.clone();
    run_stage(1, harness.ctx(&stage, sink), move |_| stub_w.clone())
        .await
        .expect("stage");

    let metrics = stage.metrics();
    assert_eq!(metrics.retried, 2);
    assert_eq!(metrics.deferred, 1);
    assert_eq!(metrics.final_exhausted, 1);
    assert_eq!(metrics.ok, 0);
    assert_eq!(metrics.completed, 1, "exhaustion is terminal completion");
    assert_eq!(stub.fetch_count(), 4, "three primary attempts plus one sweep");

    let deferred =
        std::fs::read_to_string(harness.audit_dir.join("deferred.ndjson")).expect("deferred");
    assert_eq!(deferred.lines().count(), 1);
    let exhausted =
        std::fs::read_to_string(harness.audit_dir.join("failures_exhausted.ndjson"))
            .expect("exhausted");
    assert_eq!(exhausted.lines().count(), 1);
    assert!(exhausted.contains("doomed"));
    assert!(exhausted.contains("\"attempts\":3"));
}

/// Extraction failures (payload without the data subtree) take the same
/// retry path as transport failures.
#[tokio::test(start_paused = true)]
async fn missing_data_root_triggers_retry_not_empty_rows() {
    let harness = Harness::new();
    let url = harness
        .config
        .list_page_url(Intent::Sale, Segment::Residential, 1);
    let stub = StubFetcher::new(false);
    stub.script(&url, Ok(r#"{"props": {}}"#.to_string()));
    stub.script(&url, Ok(list_payload(1, 3)));

    let stage = Stage::new("adlist");
    stage.submit(Task::list_page(Intent::Sale, Segment::Residential, 1));
    let sink = RowSink::listings();
    let stub_w = stub.clone();
    run_stage(1, harness.ctx(&stage, sink.clone()), move |_| stub_w.clone())
        .await
        .expect("stage");

    let metrics = stage.metrics();
    assert_eq!(metrics.retried, 1);
    assert_eq!(metrics.ok, 1);
    let rows = match &sink {
        RowSink::Listings(buffer) => buffer.lock().len(),
        RowSink::Details(_) => unreachable!(),
    };
    assert_eq!(rows, 3);
}

/// Raw payloads land on disk named after their task.
#[tokio::test(start_paused = true)]
async fn raw_payloads_are_persisted_per_task() {
    let harness = Harness::new();
    let url = harness
        .config
        .list_page_url(Intent::Sale, Segment::Residential, 1);
    let stub = StubFetcher::new(false);
    stub.script(&url, Ok(list_payload(1, 1)));

    let stage = Stage::new("adlist");
    stage.submit(Task::list_page(Intent::Sale, Segment::Residential, 1));
    let stub_w = stub.clone();
    run_stage(1, harness.ctx(&stage, RowSink::listings()), move |_| stub_w.clone())
        .await
        .expect("stage");

    let payload_path = harness
        ._dir
        .path()
        .join("payloads")
        .join("sale_residential_page_1.json");
    assert!(payload_path.is_file());
}
