//! Configuration for a harvest run.

pub mod builder;
pub mod types;

pub use builder::{
    HarvestConfigBuilder, DEFAULT_ELEMENT_WAIT_TIMEOUT_SECS, DEFAULT_LAUNCH_STAGGER_STEP_SECS,
    DEFAULT_PAGE_LOAD_TIMEOUT_SECS, DEFAULT_STATUS_INTERVAL_SECS, DEFAULT_WORKERS_PER_PHASE,
};
pub use types::{CategorySpec, HarvestConfig, ProxyAuthMode};
