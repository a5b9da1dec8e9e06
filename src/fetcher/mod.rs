//! Payload fetching: one browser per worker, one proxy per session.
//!
//! The [`Fetcher`] trait is the seam the worker drives; the engine and its
//! tests never touch chromiumoxide directly. [`ChromeFetcher`] is the
//! production implementation: navigate, wait for the payload element, read
//! its text, and classify every failure into the small taxonomy the retry
//! policy is keyed on.

pub mod browser;
pub mod probe;
pub mod proxy_ext;
pub mod user_agents;

use anyhow::{Context, Result};
use chromiumoxide::Browser;
use std::collections::HashSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ProxyAuthMode;
use crate::logging::CategoryLogger;
use crate::proxy::{ProxyLease, ProxyPool};

/// Interstitial fragments that mark a soft block rather than a missing
/// payload.
const BLOCK_MARKERS: &[&str] = &[
    "access denied",
    "just a moment",
    "attention required",
    "verify you are human",
    "has been blocked",
];

/// Cadence of the payload-element poll.
const ELEMENT_POLL_MS: u64 = 500;

/// Transient fetch failures, as the retry policy sees them.
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("page load timed out")]
    Timeout,
    #[error("embedded payload missing from page")]
    MissingPayload,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("blocked by site")]
    Blocked,
}

impl FetchError {
    /// Short audit-friendly tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::MissingPayload => "missing_payload",
            Self::Transport(_) => "transport",
            Self::Blocked => "blocked",
        }
    }
}

/// Wrap a page operation with an explicit timeout so slow DNS, streaming
/// responses or wedged renderers cannot hang a worker.
pub async fn with_page_timeout<F, T>(
    operation: F,
    timeout_secs: u64,
    operation_name: &str,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(Duration::from_secs(timeout_secs), operation).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "{operation_name} timeout after {timeout_secs} seconds"
        )),
    }
}

/// What a fetcher session needs from the configuration.
#[derive(Debug, Clone)]
pub struct FetcherSettings {
    pub headless: bool,
    pub page_load_timeout_secs: u64,
    pub element_wait_timeout_secs: u64,
    /// CSS selector of the element carrying the embedded payload.
    pub payload_selector: String,
    pub proxy_auth: ProxyAuthMode,
    pub browser_revision: Option<String>,
    /// Root under which per-session profile dirs are created.
    pub session_root: PathBuf,
}

/// The seam between the engine and the browser. Implementations own one
/// browser session and one proxy lease at a time.
pub trait Fetcher: Send + 'static {
    /// Start the first session: reserve a proxy, launch, verify the proxy
    /// takes effect.
    fn open(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Fetch the embedded payload text of one URL.
    fn fetch(&mut self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;

    /// Tear the session down and start a fresh one on a different proxy
    /// with a fresh user agent.
    fn rotate(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Tear down and release all held resources.
    fn close(&mut self) -> impl Future<Output = ()> + Send;

    /// Credential-free proxy label for logs and audit entries.
    fn proxy_label(&self) -> String;

    /// Index of the proxy this fetcher started on, for the next stage's
    /// freshness exclusion.
    fn initial_proxy_index(&self) -> Option<usize>;
}

/// Production fetcher: chromiumoxide browser + proxy pool lease.
pub struct ChromeFetcher {
    settings: FetcherSettings,
    worker_id: usize,
    pool: Arc<ProxyPool>,
    exclude_initial: HashSet<usize>,
    logger: Arc<CategoryLogger>,
    lease: Option<ProxyLease>,
    initial_index: Option<usize>,
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
    session_dir: Option<PathBuf>,
    user_agent: &'static str,
    session_seq: u64,
}

impl ChromeFetcher {
    #[must_use]
    pub fn new(
        settings: FetcherSettings,
        worker_id: usize,
        pool: Arc<ProxyPool>,
        exclude_initial: HashSet<usize>,
        logger: Arc<CategoryLogger>,
    ) -> Self {
        Self {
            settings,
            worker_id,
            pool,
            exclude_initial,
            logger,
            lease: None,
            initial_index: None,
            browser: None,
            handler: None,
            session_dir: None,
            user_agent: user_agents::pick(),
            session_seq: 0,
        }
    }

    async fn launch_session(&mut self) -> Result<()> {
        let lease = self
            .lease
            .as_ref()
            .context("launch_session called without a proxy lease")?;
        let record = self.pool.record(lease.index).clone();

        self.session_seq += 1;
        let session_dir = self.settings.session_root.join(format!(
            "worker{}_s{}",
            self.worker_id, self.session_seq
        ));
        tokio::fs::create_dir_all(&session_dir)
            .await
            .context("Failed to create session directory")?;

        // Extension mode carries credentials inside a generated extension;
        // whitelist mode relies on the proxy accepting our egress IP.
        let extension_dir = match self.settings.proxy_auth {
            ProxyAuthMode::Extension if record.has_credentials() => {
                Some(proxy_ext::write_extension(&session_dir, &record).await?)
            }
            _ => None,
        };

        let opts = browser::LaunchOptions {
            headless: self.settings.headless,
            user_agent: self.user_agent.to_string(),
            proxy_server: Some(record.endpoint.clone()),
            extension_dir,
            user_data_dir: session_dir.join("profile"),
            browser_revision: self.settings.browser_revision.clone(),
        };
        let (browser, handler) = browser::launch_browser(&opts).await?;

        self.browser = Some(browser);
        self.handler = Some(handler);
        self.session_dir = Some(session_dir);
        info!(
            worker = self.worker_id,
            proxy = record.label(),
            "browser session started"
        );
        Ok(())
    }

    async fn teardown_session(&mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!(worker = self.worker_id, "browser close failed: {e}");
            }
            let _ = browser.wait().await;
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
            let _ = handler.await;
        }
        if let Some(dir) = self.session_dir.take() {
            let _ = tokio::fs::remove_dir_all(dir).await;
        }
    }

    /// One IP-echo round; rotates once when the proxy shows no effect.
    async fn verify_proxy(&mut self) -> Result<()> {
        let outcome = self.probe_once().await;
        match outcome {
            probe::ProbeOutcome::ProxyIneffective => {
                self.logger.detection(
                    self.worker_id,
                    &format!(
                        "proxy {} ineffective on startup probe, rotating once",
                        self.proxy_label()
                    ),
                );
                self.rotate().await?;
                let second = self.probe_once().await;
                self.logger.detection(
                    self.worker_id,
                    &format!("post-rotation probe outcome: {second:?}"),
                );
            }
            outcome => {
                self.logger
                    .detection(self.worker_id, &format!("startup probe outcome: {outcome:?}"));
            }
        }
        Ok(())
    }

    async fn probe_once(&mut self) -> probe::ProbeOutcome {
        let Some(browser) = self.browser.as_ref() else {
            return probe::ProbeOutcome::Inconclusive;
        };
        let host = probe::host_ip().await.unwrap_or_default();
        let via_browser = probe::browser_ip(browser).await.unwrap_or_default();
        probe::compare(&host, &via_browser)
    }

    /// Scan the rendered page for interstitial block markers.
    async fn looks_blocked(&self, page: &chromiumoxide::Page) -> bool {
        let mut haystack = String::new();
        if let Ok(eval) = page.evaluate("document.title").await
            && let Ok(serde_json::Value::String(title)) = eval.into_value()
        {
            haystack.push_str(&title.to_lowercase());
            haystack.push(' ');
        }
        if let Ok(body) = page.find_element("body").await
            && let Ok(Some(text)) = body.inner_text().await
        {
            let lowered: String = text.to_lowercase().chars().take(4096).collect();
            haystack.push_str(&lowered);
        }
        BLOCK_MARKERS.iter().any(|m| haystack.contains(m))
    }

    async fn fetch_inner(&mut self, url: &str) -> Result<String, FetchError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| FetchError::Transport("no browser session".to_string()))?;

        let page = with_page_timeout(
            async {
                browser
                    .new_page("about:blank")
                    .await
                    .map_err(|e| anyhow::anyhow!("{e}"))
            },
            self.settings.page_load_timeout_secs,
            "Page create",
        )
        .await
        .map_err(|e| FetchError::Transport(e.to_string()))?;

        let nav = with_page_timeout(
            async {
                page.goto(url).await.map_err(|e| anyhow::anyhow!("{e}"))?;
                page.wait_for_navigation()
                    .await
                    .map_err(|e| anyhow::anyhow!("{e}"))?;
                Ok(())
            },
            self.settings.page_load_timeout_secs,
            "Page navigation",
        )
        .await;

        let result = match nav {
            Err(e) => {
                let msg = e.to_string();
                if msg.contains("timeout") || msg.to_lowercase().contains("timed out") {
                    Err(FetchError::Timeout)
                } else {
                    Err(FetchError::Transport(msg))
                }
            }
            Ok(()) => self.read_payload(&page).await,
        };

        let _ = page.close().await;
        result
    }

    /// Poll for the payload element and read its text. The text must begin
    /// with `{`; anything else means the payload is absent.
    async fn read_payload(&self, page: &chromiumoxide::Page) -> Result<String, FetchError> {
        let deadline =
            Instant::now() + Duration::from_secs(self.settings.element_wait_timeout_secs);
        loop {
            if let Ok(element) = page.find_element(&self.settings.payload_selector).await {
                let text = element
                    .inner_text()
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_default();
                let trimmed = text.trim();
                if trimmed.starts_with('{') {
                    return Ok(trimmed.to_string());
                }
                debug!(
                    worker = self.worker_id,
                    "payload element present but not JSON"
                );
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(Duration::from_millis(ELEMENT_POLL_MS)).await;
        }

        if self.looks_blocked(page).await {
            self.logger
                .detection(self.worker_id, &format!("block markers on {}", page_url(page).await));
            Err(FetchError::Blocked)
        } else {
            Err(FetchError::MissingPayload)
        }
    }
}

async fn page_url(page: &chromiumoxide::Page) -> String {
    page.url().await.ok().flatten().unwrap_or_default()
}

impl Fetcher for ChromeFetcher {
    async fn open(&mut self) -> Result<()> {
        let lease = self.pool.acquire(&self.exclude_initial);
        self.initial_index = Some(lease.index);
        self.lease = Some(lease);
        self.launch_session().await?;
        self.verify_proxy().await
    }

    async fn fetch(&mut self, url: &str) -> Result<String, FetchError> {
        self.fetch_inner(url).await
    }

    async fn rotate(&mut self) -> Result<()> {
        self.teardown_session().await;
        if let Some(current) = self.lease.take() {
            self.lease = Some(self.pool.rotate(&current));
        } else {
            self.lease = Some(self.pool.acquire(&HashSet::new()));
        }
        self.user_agent = user_agents::pick();
        self.launch_session().await
    }

    async fn close(&mut self) {
        self.teardown_session().await;
        if let Some(lease) = self.lease.take() {
            self.pool.release(&lease);
        }
    }

    fn proxy_label(&self) -> String {
        self.lease
            .as_ref()
            .map(|l| self.pool.record(l.index).label().to_string())
            .unwrap_or_default()
    }

    fn initial_proxy_index(&self) -> Option<usize> {
        self.initial_index
    }
}
