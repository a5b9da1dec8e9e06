//! Two-phase harvester for property-listing portals.
//!
//! Phase A (ADLIST) enumerates paginated search-result pages; phase B
//! (ADVIEW) fetches every discovered listing's detail page. Both phases run
//! on the same engine: a shared work queue per phase with timed retries and
//! a final-sweep pass, parallel workers each owning one browser and one
//! proxy, and an extractor that mines the embedded JSON payload through
//! per-site candidate-path schemas.

pub mod audit;
pub mod config;
pub mod engine;
pub mod extract;
pub mod fetcher;
pub mod logging;
pub mod notify;
pub mod offline;
pub mod output;
pub mod proxy;
pub mod status;

pub use audit::{AuditEntry, AuditLog};
pub use config::{CategorySpec, HarvestConfig, HarvestConfigBuilder, ProxyAuthMode};
pub use engine::{
    run_harvest, run_stage, HarvestSummary, Intent, MetricsSnapshot, Pass, RowSink, Segment,
    Stage, Task, TaskKey, TaskKind, WorkerContext,
};
pub use extract::{
    extract_detail, extract_listings, DetailRow, DetailSchema, ExtractError, ListSchema,
    ListingRow, PROPERTYGURU_DETAIL, PROPERTYGURU_LIST,
};
pub use fetcher::{ChromeFetcher, FetchError, Fetcher, FetcherSettings};
pub use logging::CategoryLogger;
pub use notify::{Notifier, SinkConfig};
pub use proxy::{ProxyLease, ProxyPool, ProxyRecord};
