//! Harvest configuration types.
//!
//! Configuration is source-level: `main` builds a [`HarvestConfig`] through
//! the builder and the binary takes no arguments. Anything invalid is fatal
//! at startup, before a single browser launches.

use std::path::{Path, PathBuf};

use crate::engine::task::{Intent, Segment};
use crate::fetcher::FetcherSettings;
use crate::notify::SinkConfig;
use crate::proxy::ProxyRecord;

/// How proxy credentials reach the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyAuthMode {
    /// Generated MV3 extension answers the auth challenge.
    Extension,
    /// The proxy whitelists our egress IP; no credentials involved.
    Whitelist,
}

/// One harvest category: a market side, a segment, and how deep into its
/// pagination to go.
#[derive(Debug, Clone, Copy)]
pub struct CategorySpec {
    pub intent: Intent,
    pub segment: Segment,
    /// Highest `page_no` seeded for this category.
    pub pages_cap: u32,
}

impl CategorySpec {
    #[must_use]
    pub const fn new(intent: Intent, segment: Segment, pages_cap: u32) -> Self {
        Self {
            intent,
            segment,
            pages_cap,
        }
    }

    #[must_use]
    pub const fn is_commercial(&self) -> bool {
        self.segment.is_commercial()
    }
}

/// Main configuration for a harvest run.
///
/// **INVARIANT:** `output_root` is always an existing, writable directory
/// (the builder creates and checks it), so downstream path operations never
/// need to handle a missing root.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub(crate) output_root: PathBuf,
    pub(crate) base_url: String,
    pub(crate) payload_selector: String,
    pub(crate) adlist_workers: usize,
    pub(crate) adview_workers: usize,
    pub(crate) page_load_timeout_secs: u64,
    pub(crate) element_wait_timeout_secs: u64,
    pub(crate) launch_stagger_step_secs: u64,
    pub(crate) status_interval_secs: u64,
    pub(crate) headless: bool,
    pub(crate) browser_revision: Option<String>,
    pub(crate) categories: Vec<CategorySpec>,
    pub(crate) proxies: Vec<ProxyRecord>,
    pub(crate) proxy_auth: ProxyAuthMode,
    pub(crate) sink: SinkConfig,
}

impl HarvestConfig {
    #[must_use]
    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn adlist_workers(&self) -> usize {
        self.adlist_workers
    }

    #[must_use]
    pub const fn adview_workers(&self) -> usize {
        self.adview_workers
    }

    #[must_use]
    pub const fn launch_stagger_step_secs(&self) -> u64 {
        self.launch_stagger_step_secs
    }

    #[must_use]
    pub const fn status_interval_secs(&self) -> u64 {
        self.status_interval_secs
    }

    #[must_use]
    pub fn categories(&self) -> &[CategorySpec] {
        &self.categories
    }

    #[must_use]
    pub fn proxies(&self) -> &[ProxyRecord] {
        &self.proxies
    }

    #[must_use]
    pub const fn proxy_auth(&self) -> ProxyAuthMode {
        self.proxy_auth
    }

    #[must_use]
    pub fn sink(&self) -> &SinkConfig {
        &self.sink
    }

    /// Search-result page URL for one category page.
    #[must_use]
    pub fn list_page_url(&self, intent: Intent, segment: Segment, page_no: u32) -> String {
        let side = match intent {
            Intent::Sale => "sale",
            Intent::Rent => "rent",
        };
        match segment {
            Segment::Residential => format!("{}/property-for-{side}/{page_no}", self.base_url),
            Segment::Commercial => {
                format!("{}/commercial-property-for-{side}/{page_no}", self.base_url)
            }
        }
    }

    /// Fetcher parameters for one stage, with per-session dirs rooted at
    /// `session_root`.
    #[must_use]
    pub fn fetcher_settings(&self, session_root: PathBuf) -> FetcherSettings {
        FetcherSettings {
            headless: self.headless,
            page_load_timeout_secs: self.page_load_timeout_secs,
            element_wait_timeout_secs: self.element_wait_timeout_secs,
            payload_selector: self.payload_selector.clone(),
            proxy_auth: self.proxy_auth,
            browser_revision: self.browser_revision.clone(),
            session_root,
        }
    }
}
