//! Generated MV3 extension for proxy Basic authentication.
//!
//! Chromium has no flag for proxy credentials, so in extension mode each
//! worker gets a throwaway unpacked extension that pins the proxy via the
//! `proxy` API and answers the auth challenge from `onAuthRequired`. The
//! directory lives under the worker's session dir and dies with it.

use anyhow::{Context, Result};
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::proxy::ProxyRecord;

/// Write an unpacked proxy-auth extension and return its directory, ready
/// for `--load-extension`.
pub async fn write_extension(session_dir: &Path, proxy: &ProxyRecord) -> Result<PathBuf> {
    let (host, port) = proxy
        .endpoint
        .rsplit_once(':')
        .with_context(|| format!("proxy endpoint has no port: {}", proxy.endpoint))?;

    let ext_dir = session_dir.join("proxy_ext");
    tokio::fs::create_dir_all(&ext_dir)
        .await
        .context("Failed to create proxy extension directory")?;

    let manifest = json!({
        "name": "Session Proxy",
        "version": "1.0.0",
        "manifest_version": 3,
        "permissions": ["proxy", "webRequest", "webRequestAuthProvider"],
        "host_permissions": ["<all_urls>"],
        "background": {"service_worker": "background.js"}
    });
    tokio::fs::write(
        ext_dir.join("manifest.json"),
        serde_json::to_string_pretty(&manifest)?,
    )
    .await
    .context("Failed to write extension manifest")?;

    let username = proxy.username.as_deref().unwrap_or_default();
    let password = proxy.password.as_deref().unwrap_or_default();
    let background = format!(
        r#"const config = {{
  mode: "fixed_servers",
  rules: {{
    singleProxy: {{ scheme: "http", host: "{host}", port: {port} }},
    bypassList: ["localhost", "127.0.0.1"]
  }}
}};
chrome.proxy.settings.set({{ value: config, scope: "regular" }}, () => {{}});
chrome.webRequest.onAuthRequired.addListener(
  () => ({{ authCredentials: {{ username: "{username}", password: "{password}" }} }}),
  {{ urls: ["<all_urls>"] }},
  ["blocking"]
);
"#
    );
    tokio::fs::write(ext_dir.join("background.js"), background)
        .await
        .context("Failed to write extension worker")?;

    Ok(ext_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_manifest_and_worker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let proxy = ProxyRecord::with_credentials("198.51.100.7:3128", "user", "secret");
        let ext = write_extension(dir.path(), &proxy).await.expect("ext");

        let manifest = tokio::fs::read_to_string(ext.join("manifest.json"))
            .await
            .expect("manifest");
        assert!(manifest.contains("\"manifest_version\": 3"));

        let background = tokio::fs::read_to_string(ext.join("background.js"))
            .await
            .expect("worker");
        assert!(background.contains("198.51.100.7"));
        assert!(background.contains("3128"));
        assert!(background.contains("secret"));
    }

    #[tokio::test]
    async fn rejects_endpoint_without_port() {
        let dir = tempfile::tempdir().expect("tempdir");
        let proxy = ProxyRecord::new("no-port-here");
        assert!(write_extension(dir.path(), &proxy).await.is_err());
    }
}
