//! Type-safe builder for `HarvestConfig` using the typestate pattern.
//!
//! The output root is the one field without a sensible default, so setting
//! it is enforced at compile time; everything else is validated at `build`.

use anyhow::{anyhow, Result};
use std::marker::PhantomData;
use std::path::PathBuf;

use super::types::{CategorySpec, HarvestConfig, ProxyAuthMode};
use crate::notify::SinkConfig;
use crate::proxy::ProxyRecord;

/// Default page-load timeout: navigation plus render settle.
pub const DEFAULT_PAGE_LOAD_TIMEOUT_SECS: u64 = 45;

/// Default wait for the payload element after navigation.
pub const DEFAULT_ELEMENT_WAIT_TIMEOUT_SECS: u64 = 25;

/// Default launch stagger step between workers.
pub const DEFAULT_LAUNCH_STAGGER_STEP_SECS: u64 = 2;

/// Default dashboard refresh cadence.
pub const DEFAULT_STATUS_INTERVAL_SECS: u64 = 20;

/// Default workers per phase.
pub const DEFAULT_WORKERS_PER_PHASE: usize = 5;

const DEFAULT_BASE_URL: &str = "https://www.propertyguru.com.my";
const DEFAULT_PAYLOAD_SELECTOR: &str = "script#__NEXT_DATA__";

// Type states for the builder
pub struct WithOutputRoot;

pub struct HarvestConfigBuilder<State = ()> {
    output_root: Option<PathBuf>,
    base_url: String,
    payload_selector: String,
    adlist_workers: usize,
    adview_workers: usize,
    page_load_timeout_secs: u64,
    element_wait_timeout_secs: u64,
    launch_stagger_step_secs: u64,
    status_interval_secs: u64,
    headless: bool,
    browser_revision: Option<String>,
    categories: Vec<CategorySpec>,
    proxies: Vec<ProxyRecord>,
    proxy_auth: ProxyAuthMode,
    sink: SinkConfig,
    _phantom: PhantomData<State>,
}

impl Default for HarvestConfigBuilder<()> {
    fn default() -> Self {
        Self {
            output_root: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            payload_selector: DEFAULT_PAYLOAD_SELECTOR.to_string(),
            adlist_workers: DEFAULT_WORKERS_PER_PHASE,
            adview_workers: DEFAULT_WORKERS_PER_PHASE,
            page_load_timeout_secs: DEFAULT_PAGE_LOAD_TIMEOUT_SECS,
            element_wait_timeout_secs: DEFAULT_ELEMENT_WAIT_TIMEOUT_SECS,
            launch_stagger_step_secs: DEFAULT_LAUNCH_STAGGER_STEP_SECS,
            status_interval_secs: DEFAULT_STATUS_INTERVAL_SECS,
            headless: true,
            browser_revision: None,
            categories: Vec::new(),
            proxies: Vec::new(),
            proxy_auth: ProxyAuthMode::Whitelist,
            sink: SinkConfig::default(),
            _phantom: PhantomData,
        }
    }
}

impl HarvestConfigBuilder<()> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output root, unlocking `build`.
    #[must_use]
    pub fn output_root(self, path: impl Into<PathBuf>) -> HarvestConfigBuilder<WithOutputRoot> {
        HarvestConfigBuilder {
            output_root: Some(path.into()),
            base_url: self.base_url,
            payload_selector: self.payload_selector,
            adlist_workers: self.adlist_workers,
            adview_workers: self.adview_workers,
            page_load_timeout_secs: self.page_load_timeout_secs,
            element_wait_timeout_secs: self.element_wait_timeout_secs,
            launch_stagger_step_secs: self.launch_stagger_step_secs,
            status_interval_secs: self.status_interval_secs,
            headless: self.headless,
            browser_revision: self.browser_revision,
            categories: self.categories,
            proxies: self.proxies,
            proxy_auth: self.proxy_auth,
            sink: self.sink,
            _phantom: PhantomData,
        }
    }
}

impl<State> HarvestConfigBuilder<State> {
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn payload_selector(mut self, selector: impl Into<String>) -> Self {
        self.payload_selector = selector.into();
        self
    }

    #[must_use]
    pub fn workers(mut self, adlist: usize, adview: usize) -> Self {
        self.adlist_workers = adlist;
        self.adview_workers = adview;
        self
    }

    #[must_use]
    pub fn page_load_timeout_secs(mut self, secs: u64) -> Self {
        self.page_load_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn element_wait_timeout_secs(mut self, secs: u64) -> Self {
        self.element_wait_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn launch_stagger_step_secs(mut self, secs: u64) -> Self {
        self.launch_stagger_step_secs = secs;
        self
    }

    #[must_use]
    pub fn status_interval_secs(mut self, secs: u64) -> Self {
        self.status_interval_secs = secs;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Pin the managed-download Chromium revision.
    #[must_use]
    pub fn browser_revision(mut self, revision: impl Into<String>) -> Self {
        self.browser_revision = Some(revision.into());
        self
    }

    #[must_use]
    pub fn category(mut self, spec: CategorySpec) -> Self {
        self.categories.push(spec);
        self
    }

    #[must_use]
    pub fn categories(mut self, specs: impl IntoIterator<Item = CategorySpec>) -> Self {
        self.categories.extend(specs);
        self
    }

    #[must_use]
    pub fn proxies(mut self, proxies: impl IntoIterator<Item = ProxyRecord>) -> Self {
        self.proxies.extend(proxies);
        self
    }

    #[must_use]
    pub fn proxy_auth(mut self, mode: ProxyAuthMode) -> Self {
        self.proxy_auth = mode;
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: SinkConfig) -> Self {
        self.sink = sink;
        self
    }
}

impl HarvestConfigBuilder<WithOutputRoot> {
    /// Validate and build. Configuration errors are fatal here, at startup.
    pub fn build(self) -> Result<HarvestConfig> {
        let output_root = self
            .output_root
            .expect("typestate guarantees output_root is set");

        if self.proxies.is_empty() {
            return Err(anyhow!("proxy list is empty"));
        }
        if self.categories.is_empty() {
            return Err(anyhow!("no harvest categories configured"));
        }
        if self.adlist_workers == 0 || self.adview_workers == 0 {
            return Err(anyhow!("worker counts must be at least 1"));
        }
        if let Some(spec) = self.categories.iter().find(|c| c.pages_cap == 0) {
            return Err(anyhow!(
                "category {}/{} has a zero pages cap",
                spec.intent,
                spec.segment
            ));
        }

        std::fs::create_dir_all(&output_root)
            .map_err(|e| anyhow!("output root {} unusable: {e}", output_root.display()))?;
        let output_root = output_root
            .canonicalize()
            .map_err(|e| anyhow!("output root {} unresolvable: {e}", output_root.display()))?;

        Ok(HarvestConfig {
            output_root,
            base_url: self.base_url.trim_end_matches('/').to_string(),
            payload_selector: self.payload_selector,
            adlist_workers: self.adlist_workers,
            adview_workers: self.adview_workers,
            page_load_timeout_secs: self.page_load_timeout_secs,
            element_wait_timeout_secs: self.element_wait_timeout_secs,
            launch_stagger_step_secs: self.launch_stagger_step_secs,
            status_interval_secs: self.status_interval_secs,
            headless: self.headless,
            browser_revision: self.browser_revision,
            categories: self.categories,
            proxies: self.proxies,
            proxy_auth: self.proxy_auth,
            sink: self.sink,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::task::{Intent, Segment};

    fn valid(dir: &std::path::Path) -> HarvestConfigBuilder<WithOutputRoot> {
        HarvestConfigBuilder::new()
            .category(CategorySpec::new(Intent::Sale, Segment::Residential, 10))
            .proxies([ProxyRecord::new("10.0.0.1:8080")])
            .output_root(dir)
    }

    #[test]
    fn build_validates_and_creates_output_root() {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().join("runs");
        let config = valid(&root).build().expect("config");
        assert!(config.output_root().is_dir());
        assert_eq!(config.adlist_workers(), DEFAULT_WORKERS_PER_PHASE);
    }

    #[test]
    fn empty_proxy_list_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = HarvestConfigBuilder::new()
            .category(CategorySpec::new(Intent::Sale, Segment::Residential, 10))
            .output_root(dir.path())
            .build()
            .expect_err("must fail");
        assert!(err.to_string().contains("proxy list"));
    }

    #[test]
    fn empty_categories_are_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = HarvestConfigBuilder::new()
            .proxies([ProxyRecord::new("10.0.0.1:8080")])
            .output_root(dir.path())
            .build()
            .expect_err("must fail");
        assert!(err.to_string().contains("categories"));
    }

    #[test]
    fn list_page_urls_cover_both_segments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = valid(dir.path()).build().expect("config");
        assert_eq!(
            config.list_page_url(Intent::Sale, Segment::Residential, 3),
            "https://www.propertyguru.com.my/property-for-sale/3"
        );
        assert_eq!(
            config.list_page_url(Intent::Rent, Segment::Commercial, 1),
            "https://www.propertyguru.com.my/commercial-property-for-rent/1"
        );
    }
}
