//! Startup proxy verification.
//!
//! After a browser session opens, compare the egress IP the browser sees
//! with the host's own IP. Equal addresses mean the proxy is not taking
//! effect. The probe is advisory: the site's behavior is the ultimate
//! signal, so a still-failing probe does not stop the worker.

use anyhow::{Context, Result};
use chromiumoxide::Browser;
use std::time::Duration;

const ECHO_URL: &str = "https://api.ipify.org?format=text";

/// Outcome of one probe round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Browser egress differs from the host IP.
    ProxyEffective,
    /// Browser egress equals the host IP: requests are going out direct.
    ProxyIneffective,
    /// Either side of the comparison could not be observed.
    Inconclusive,
}

/// The host's direct egress IP, fetched without any proxy.
pub async fn host_ip() -> Result<String> {
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build probe client")?;
    let ip = client
        .get(ECHO_URL)
        .send()
        .await
        .context("Host IP echo request failed")?
        .text()
        .await
        .context("Host IP echo body unreadable")?;
    Ok(ip.trim().to_string())
}

/// The egress IP as observed through the browser (and so through its
/// proxy, if one is wired in).
pub async fn browser_ip(browser: &Browser) -> Result<String> {
    let page = browser
        .new_page(ECHO_URL)
        .await
        .context("Failed to open echo page")?;
    page.wait_for_navigation()
        .await
        .context("Echo page did not load")?;
    let body = page
        .find_element("body")
        .await
        .context("Echo page has no body")?;
    let text = body
        .inner_text()
        .await
        .context("Echo body unreadable")?
        .unwrap_or_default();
    let _ = page.close().await;
    Ok(text.trim().to_string())
}

/// Compare the two egress addresses.
#[must_use]
pub fn compare(host: &str, via_browser: &str) -> ProbeOutcome {
    if host.is_empty() || via_browser.is_empty() {
        return ProbeOutcome::Inconclusive;
    }
    if host == via_browser {
        ProbeOutcome::ProxyIneffective
    } else {
        ProbeOutcome::ProxyEffective
    }
}
