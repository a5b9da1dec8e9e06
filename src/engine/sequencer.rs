//! Phase sequencing: ADLIST to completion, then ADVIEW seeded from its
//! output, then final CSV assembly.
//!
//! The sequencer only observes stages through their counters and row
//! buffers; all transient failure handling lives in the workers. Each phase
//! runs its primary pass to quiescence, re-injects deferred tasks as the
//! final sweep, runs to quiescence again, and only then shuts its workers
//! down.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::audit::AuditLog;
use crate::config::HarvestConfig;
use crate::engine::metrics::MetricsSnapshot;
use crate::engine::stage::Stage;
use crate::engine::task::Task;
use crate::engine::worker::{run_worker, RowSink, WorkerContext};
use crate::extract::rows::DetailRow;
use crate::extract::{PROPERTYGURU_DETAIL, PROPERTYGURU_LIST};
use crate::fetcher::{ChromeFetcher, Fetcher};
use crate::logging::CategoryLogger;
use crate::notify::Notifier;
use crate::output::{dedupe_listings, write_adlist_csv, write_adview_csv};
use crate::proxy::ProxyPool;
use crate::status::spawn_reporter;

/// Quiescence poll cadence.
const QUIESCENCE_POLL: Duration = Duration::from_secs(1);

/// What a completed run produced.
#[derive(Debug)]
pub struct HarvestSummary {
    pub adlist: MetricsSnapshot,
    pub adview: MetricsSnapshot,
    pub adlist_csv: PathBuf,
    pub adview_csv: PathBuf,
    pub listing_count: usize,
    pub detail_count: usize,
}

/// Poll the stage at 1 Hz until ready, delayed, deferred and in-flight are
/// all empty in one observation.
pub async fn wait_quiescent(stage: &Stage) {
    loop {
        if stage.is_quiescent() {
            return;
        }
        tokio::time::sleep(QUIESCENCE_POLL).await;
    }
}

/// Poll at 1 Hz until the primary pass has drained (deferred tasks may
/// still be parked for the sweep).
pub async fn wait_primary_drained(stage: &Stage) {
    loop {
        if stage.is_primary_drained() {
            return;
        }
        tokio::time::sleep(QUIESCENCE_POLL).await;
    }
}

/// Drive one stage to full completion: primary pass, final sweep, worker
/// shutdown. Returns the initial proxy index of every worker that reported
/// one.
pub async fn run_stage<F, Mk>(
    worker_count: usize,
    ctx: WorkerContext,
    make_fetcher: Mk,
) -> Result<Vec<usize>>
where
    F: Fetcher,
    Mk: Fn(usize) -> F,
{
    if ctx.stage.is_quiescent() {
        info!(stage = ctx.stage.name(), "nothing seeded, skipping stage");
        ctx.stage.close();
        return Ok(Vec::new());
    }

    let dispatcher = ctx.stage.spawn_dispatcher();

    let mut handles = Vec::with_capacity(worker_count);
    for worker_id in 0..worker_count {
        let fetcher = make_fetcher(worker_id);
        let worker_ctx = ctx.clone();
        handles.push(tokio::spawn(run_worker(worker_id, fetcher, worker_ctx)));
    }

    wait_primary_drained(&ctx.stage).await;
    let swept = ctx.stage.drain_deferred_into_ready();
    if swept > 0 {
        info!(stage = ctx.stage.name(), swept, "final sweep started");
        ctx.notifier
            .post_event(&format!(
                "[{}] final sweep: {swept} deferred tasks re-injected",
                ctx.stage.name()
            ))
            .await;
        wait_quiescent(&ctx.stage).await;
    }
    ctx.stage.close();

    let mut initial_proxies = Vec::new();
    for handle in handles {
        match handle.await {
            Ok(Some(index)) => initial_proxies.push(index),
            Ok(None) => {}
            Err(e) => warn!(stage = ctx.stage.name(), "worker task panicked: {e}"),
        }
    }
    let _ = dispatcher.await;

    info!(
        stage = ctx.stage.name(),
        metrics = ?ctx.stage.metrics(),
        "stage complete"
    );
    Ok(initial_proxies)
}

/// Run the whole two-phase harvest.
pub async fn run_harvest(config: HarvestConfig) -> Result<HarvestSummary> {
    let config = Arc::new(config);
    let run_ts = Utc::now().format("%Y%m%d_%H%M%S").to_string();

    let adlist_dir = config.output_root().join(format!("adlist_{run_ts}"));
    let adview_dir = config.output_root().join(format!("adview_{run_ts}"));
    let logs_dir = config.output_root().join(format!("logs_{run_ts}"));
    for dir in [&adlist_dir, &adview_dir, &logs_dir] {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    let logger = CategoryLogger::create(&logs_dir)?;
    let notifier = Arc::new(Notifier::new(config.sink().clone()));
    let audit = AuditLog::create(&adview_dir.join("audit"))?;
    let pool = ProxyPool::new(config.proxies().to_vec());
    let session_root = std::env::temp_dir().join(format!("propharvest_{run_ts}"));

    notifier
        .post_event(&format!(
            "harvest {run_ts} starting: {} categories, {} proxies",
            config.categories().len(),
            pool.len()
        ))
        .await;

    // ---- Stage A: ADLIST ----
    let stage_a = Stage::new("adlist");
    for spec in config.categories() {
        for page_no in 1..=spec.pages_cap {
            stage_a.submit(Task::list_page(spec.intent, spec.segment, page_no));
        }
    }

    let listings_sink = RowSink::listings();
    let ctx_a = WorkerContext {
        config: Arc::clone(&config),
        stage: Arc::clone(&stage_a),
        sink: listings_sink.clone(),
        audit: Arc::clone(&audit),
        logger: Arc::clone(&logger),
        notifier: Arc::clone(&notifier),
        payload_dir: adlist_dir.clone(),
        detail_schema: &PROPERTYGURU_DETAIL,
        list_schema: &PROPERTYGURU_LIST,
    };

    let reporter_a = spawn_reporter(
        "ADLIST",
        vec![Arc::clone(&stage_a)],
        Arc::clone(&notifier),
        config.status_interval_secs(),
    );
    let settings_a = config.fetcher_settings(session_root.join("adlist"));
    let pool_a = Arc::clone(&pool);
    let logger_a = Arc::clone(&logger);
    let adlist_initial = run_stage(config.adlist_workers(), ctx_a, move |worker_id| {
        ChromeFetcher::new(
            settings_a.clone(),
            worker_id,
            Arc::clone(&pool_a),
            HashSet::new(),
            Arc::clone(&logger_a),
        )
    })
    .await?;
    reporter_a.abort();

    // ---- Assemble ADLIST output ----
    let raw_listings = match &listings_sink {
        RowSink::Listings(buffer) => std::mem::take(&mut *buffer.lock()),
        RowSink::Details(_) => unreachable!("stage A sinks listings"),
    };
    let listings = dedupe_listings(raw_listings);
    let adlist_csv = adlist_dir.join(format!("PG_adlist_{run_ts}.csv"));
    write_adlist_csv(&adlist_csv, &listings)?;
    info!(rows = listings.len(), csv = %adlist_csv.display(), "ADLIST CSV written");
    notifier
        .post_event(&format!(
            "ADLIST done: {} listings across {} pages ok",
            listings.len(),
            stage_a.metrics().ok
        ))
        .await;
    notifier.upload_file(&adlist_csv).await;

    // ---- Stage B: ADVIEW ----
    let stage_b = Stage::new("adview");
    let mut seen_urls = HashSet::new();
    for listing in &listings {
        if seen_urls.insert(listing.url.clone()) {
            stage_b.submit(Task::detail_page(
                listing.url.clone(),
                listing.intent,
                listing.segment,
                (!listing.listing_id.is_empty()).then(|| listing.listing_id.clone()),
            ));
        }
    }

    let details_sink = RowSink::details();
    let ctx_b = WorkerContext {
        config: Arc::clone(&config),
        stage: Arc::clone(&stage_b),
        sink: details_sink.clone(),
        audit: Arc::clone(&audit),
        logger: Arc::clone(&logger),
        notifier: Arc::clone(&notifier),
        payload_dir: adview_dir.clone(),
        detail_schema: &PROPERTYGURU_DETAIL,
        list_schema: &PROPERTYGURU_LIST,
    };

    let reporter_b = spawn_reporter(
        "ADVIEW",
        vec![Arc::clone(&stage_a), Arc::clone(&stage_b)],
        Arc::clone(&notifier),
        config.status_interval_secs(),
    );
    // Freshness heuristic: avoid handing stage B workers the proxies that
    // served as stage A initial assignments. The pool degrades to the full
    // list when the exclusion would empty it.
    let exclude_b: HashSet<usize> = adlist_initial.into_iter().collect();
    let settings_b = config.fetcher_settings(session_root.join("adview"));
    let pool_b = Arc::clone(&pool);
    let logger_b = Arc::clone(&logger);
    run_stage(config.adview_workers(), ctx_b, move |worker_id| {
        ChromeFetcher::new(
            settings_b.clone(),
            worker_id,
            Arc::clone(&pool_b),
            exclude_b.clone(),
            Arc::clone(&logger_b),
        )
    })
    .await?;
    reporter_b.abort();

    // ---- Assemble final ADVIEW output ----
    let details: Vec<DetailRow> = match &details_sink {
        RowSink::Details(buffer) => std::mem::take(&mut *buffer.lock()),
        RowSink::Listings(_) => unreachable!("stage B sinks details"),
    };
    let adview_csv = adview_dir.join(format!("PG_adview_{run_ts}.csv"));
    write_adview_csv(&adview_csv, &details, &listings)?;
    info!(rows = details.len(), csv = %adview_csv.display(), "ADVIEW CSV written");
    notifier
        .post_event(&format!(
            "ADVIEW done: {} detail rows, {} exhausted",
            details.len(),
            stage_b.metrics().final_exhausted
        ))
        .await;
    notifier.upload_file(&adview_csv).await;

    let _ = tokio::fs::remove_dir_all(&session_root).await;

    Ok(HarvestSummary {
        adlist: stage_a.metrics(),
        adview: stage_b.metrics(),
        adlist_csv,
        adview_csv,
        listing_count: listings.len(),
        detail_count: details.len(),
    })
}

/// Summary convenience used by `main` and tests.
impl HarvestSummary {
    /// Both stages drained with every admitted task accounted for.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.adlist.completed == self.adlist.total && self.adview.completed == self.adview.total
    }
}
