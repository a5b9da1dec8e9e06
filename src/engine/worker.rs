//! Worker loop and retry policy.
//!
//! A worker owns one browser and one proxy at a time. It pulls tasks from
//! the shared stage, fetches the embedded payload, extracts rows, and on any
//! transient failure tears its session down, rotates proxy and user agent,
//! and applies the tiered retry policy:
//!
//! - attempt 1 fails → re-inject after a random 60–180 s
//! - attempt 2 fails → re-inject after a random 600–780 s
//! - attempt 3 fails → defer for the final sweep; a final-sweep failure is
//!   terminal and audited as exhausted
//!
//! Everything transient is absorbed here; nothing bubbles to the sequencer.

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::audit::{AuditEntry, AuditLog};
use crate::config::HarvestConfig;
use crate::extract::rows::{DetailRow, ListingRow};
use crate::extract::{
    extract_detail, extract_listings, DetailContext, DetailSchema, ListContext, ListSchema,
};
use crate::fetcher::Fetcher;
use crate::logging::CategoryLogger;
use crate::notify::Notifier;

use super::stage::Stage;
use super::task::{Pass, Task, TaskKind};

/// How long one `take` blocks before the worker re-checks for shutdown.
const TAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Where extracted rows accumulate until the sequencer consumes them.
#[derive(Clone)]
pub enum RowSink {
    Listings(Arc<Mutex<Vec<ListingRow>>>),
    Details(Arc<Mutex<Vec<DetailRow>>>),
}

impl RowSink {
    #[must_use]
    pub fn listings() -> Self {
        Self::Listings(Arc::new(Mutex::new(Vec::new())))
    }

    #[must_use]
    pub fn details() -> Self {
        Self::Details(Arc::new(Mutex::new(Vec::new())))
    }
}

/// Everything a worker shares with its peers on one stage.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<HarvestConfig>,
    pub stage: Arc<Stage>,
    pub sink: RowSink,
    pub audit: Arc<AuditLog>,
    pub logger: Arc<CategoryLogger>,
    pub notifier: Arc<Notifier>,
    /// Directory raw payloads are written under.
    pub payload_dir: PathBuf,
    pub detail_schema: &'static DetailSchema,
    pub list_schema: &'static ListSchema,
}

impl WorkerContext {
    fn task_url(&self, task: &Task) -> String {
        match &task.kind {
            TaskKind::ListPage {
                intent,
                segment,
                page_no,
            } => self.config.list_page_url(*intent, *segment, *page_no),
            TaskKind::DetailPage { url, .. } => url.clone(),
        }
    }
}

/// Run one worker to stage shutdown. Returns the index of the proxy the
/// worker started on, feeding the next stage's freshness exclusion.
pub async fn run_worker<F: Fetcher>(
    worker_id: usize,
    mut fetcher: F,
    ctx: WorkerContext,
) -> Option<usize> {
    // Desynchronize the initial burst of browser launches.
    let stagger = (worker_id as u64 + 1) * ctx.config.launch_stagger_step_secs();
    tokio::time::sleep(Duration::from_secs(stagger)).await;

    if let Err(e) = fetcher.open().await {
        ctx.logger
            .error(worker_id, &format!("browser session failed to open: {e:#}"));
        warn!(worker = worker_id, "worker exiting, open failed: {e:#}");
        let initial = fetcher.initial_proxy_index();
        fetcher.close().await;
        return initial;
    }
    info!(worker = worker_id, stage = ctx.stage.name(), "worker started");

    loop {
        let Some(task) = ctx.stage.take(TAKE_TIMEOUT).await else {
            if ctx.stage.is_closed() {
                break;
            }
            continue;
        };

        let url = ctx.task_url(&task);
        let started = Instant::now();
        match fetcher.fetch(&url).await {
            Ok(json_text) => match extract_rows(&task, &json_text, &ctx) {
                Ok(count) => {
                    finish_ok(worker_id, &task, &url, &json_text, count, started, &mut fetcher, &ctx)
                        .await;
                    let pause = rand::rng().random_range(1600..=3200);
                    tokio::time::sleep(Duration::from_millis(pause)).await;
                }
                Err(reason) => {
                    // A payload without the expected subtree is
                    // indistinguishable from a soft block.
                    recover(worker_id, task, &reason, &mut fetcher, &ctx).await;
                }
            },
            Err(e) => {
                let reason = format!("{}: {e}", e.kind());
                recover(worker_id, task, &reason, &mut fetcher, &ctx).await;
            }
        }
    }

    let initial = fetcher.initial_proxy_index();
    fetcher.close().await;
    info!(worker = worker_id, stage = ctx.stage.name(), "worker stopped");
    initial
}

/// Extract and buffer rows for one fetched payload. Returns the row count.
fn extract_rows(task: &Task, json_text: &str, ctx: &WorkerContext) -> Result<usize, String> {
    match (&task.kind, &ctx.sink) {
        (
            TaskKind::ListPage {
                intent,
                segment,
                page_no,
            },
            RowSink::Listings(buffer),
        ) => {
            let rows = extract_listings(
                json_text,
                ctx.list_schema,
                ListContext {
                    intent: *intent,
                    segment: *segment,
                    page_no: *page_no,
                },
            )
            .map_err(|e| e.to_string())?;
            let count = rows.len();
            buffer.lock().extend(rows);
            Ok(count)
        }
        (
            TaskKind::DetailPage {
                url,
                intent,
                segment,
                listing_id,
            },
            RowSink::Details(buffer),
        ) => {
            let row = extract_detail(
                json_text,
                ctx.detail_schema,
                &DetailContext {
                    url: url.clone(),
                    intent: *intent,
                    segment: *segment,
                    listing_id: listing_id.clone(),
                },
            )
            .map_err(|e| e.to_string())?;
            buffer.lock().push(row);
            Ok(1)
        }
        _ => Err("task kind does not match stage row sink".to_string()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn finish_ok<F: Fetcher>(
    worker_id: usize,
    task: &Task,
    url: &str,
    json_text: &str,
    row_count: usize,
    started: Instant,
    fetcher: &mut F,
    ctx: &WorkerContext,
) {
    if let Err(e) = crate::output::save_payload(&ctx.payload_dir, task, json_text).await {
        // Extraction already succeeded; a failed raw save loses the replay
        // artifact but not the row.
        ctx.logger
            .error(worker_id, &format!("raw payload save failed for {url}: {e:#}"));
    }

    let key = task.key();
    ctx.stage.mark_done(&key);
    ctx.audit.success(&AuditEntry {
        key: key.to_string(),
        attempts: task.attempt,
        reason: "ok".to_string(),
        worker_id,
        proxy_label: fetcher.proxy_label(),
        first_failure_unix: task.first_failure_unix,
        last_attempt_unix: Utc::now().timestamp(),
    });
    ctx.logger.performance(
        worker_id,
        &format!(
            "{key} ok: {row_count} rows in {:.1}s (attempt {})",
            started.elapsed().as_secs_f64(),
            task.attempt
        ),
    );
    debug!(worker = worker_id, %key, row_count, "task completed");
}

/// Failure recovery: rotate the session, then apply the tiered policy.
async fn recover<F: Fetcher>(
    worker_id: usize,
    mut task: Task,
    reason: &str,
    fetcher: &mut F,
    ctx: &WorkerContext,
) {
    let key = task.key();
    let now = Utc::now().timestamp();
    task.note_failure(reason, now);
    ctx.logger.error(
        worker_id,
        &format!("{key} attempt {} failed: {reason}", task.attempt),
    );

    if let Err(e) = fetcher.rotate().await {
        ctx.logger
            .error(worker_id, &format!("rotation failed, continuing: {e:#}"));
    }

    match task.attempt {
        1 => {
            let delay = rand::rng().random_range(60..=180);
            task.attempt = 2;
            ctx.notifier
                .post_event(&format!(
                    "[{}] retry 1 for {key} in {delay}s ({reason})",
                    ctx.stage.name()
                ))
                .await;
            ctx.stage.schedule_retry(task, Duration::from_secs(delay));
        }
        2 => {
            let delay = rand::rng().random_range(600..=780);
            task.attempt = 3;
            ctx.notifier
                .post_event(&format!(
                    "[{}] retry 2 for {key} in {delay}s ({reason})",
                    ctx.stage.name()
                ))
                .await;
            ctx.stage.schedule_retry(task, Duration::from_secs(delay));
        }
        _ => {
            let entry = AuditEntry {
                key: key.to_string(),
                attempts: task.attempt,
                reason: reason.to_string(),
                worker_id,
                proxy_label: fetcher.proxy_label(),
                first_failure_unix: task.first_failure_unix,
                last_attempt_unix: now,
            };
            if task.pass == Pass::FinalSweep {
                ctx.audit.exhaustion(&entry);
                ctx.stage.mark_failed_final(&key);
                ctx.notifier
                    .post_event(&format!("[{}] exhausted: {key}", ctx.stage.name()))
                    .await;
            } else {
                ctx.audit.deferral(&entry);
                ctx.notifier
                    .post_event(&format!(
                        "[{}] deferred to final sweep: {key}",
                        ctx.stage.name()
                    ))
                    .await;
                ctx.stage.defer(task);
            }
        }
    }
}
