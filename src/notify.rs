//! Best-effort notification sink client.
//!
//! The sink is a webhook-style service: `POST {content}` for events,
//! `PATCH <dashboard-url> {content}` for in-place dashboard edits, and a
//! multipart `POST` for file uploads. Every call swallows its own failures;
//! a dead sink must never slow down or fail the harvest.

use reqwest::multipart;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Sink endpoints. Any of them may be absent, which turns the matching
/// call into a no-op.
#[derive(Debug, Clone, Default)]
pub struct SinkConfig {
    /// Event webhook, `POST {content}`.
    pub event_url: Option<String>,
    /// Dashboard message URL, `PATCH {content}` edits it in place.
    pub dashboard_url: Option<String>,
    /// Upload endpoint accepting multipart `POST`.
    pub upload_url: Option<String>,
}

pub struct Notifier {
    client: reqwest::Client,
    config: SinkConfig,
}

impl Notifier {
    #[must_use]
    pub fn new(config: SinkConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { client, config }
    }

    /// Post one event line. Fire-and-forget.
    pub async fn post_event(&self, content: &str) {
        let Some(url) = &self.config.event_url else {
            return;
        };
        let result = self
            .client
            .post(url)
            .json(&json!({ "content": content }))
            .send()
            .await;
        if let Err(e) = result {
            warn!("event notification failed: {e}");
        }
    }

    /// Edit the live dashboard message in place.
    pub async fn edit_dashboard(&self, content: &str) {
        let Some(url) = &self.config.dashboard_url else {
            return;
        };
        let result = self
            .client
            .patch(url)
            .json(&json!({ "content": content }))
            .send()
            .await;
        if let Err(e) = result {
            warn!("dashboard edit failed: {e}");
        }
    }

    /// Upload one file. Unreadable files and transport failures are logged
    /// and dropped.
    pub async fn upload_file(&self, path: &Path) {
        let Some(url) = &self.config.upload_url else {
            return;
        };
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("upload skipped, cannot read {}: {e}", path.display());
                return;
            }
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload.bin".to_string());
        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(bytes).file_name(file_name));
        if let Err(e) = self.client.post(url).multipart(form).send().await {
            warn!("file upload failed: {e}");
        }
    }
}
