//! Append-only NDJSON audit trail.
//!
//! Three files under the stage output's `audit/` directory: one line per
//! success, per deferral, and per final exhaustion. Between them every
//! admitted task key can be accounted for after the run, with enough
//! context (attempts, proxy, timestamps, reason) to replay.

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// One audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Task key: the page URL, or the category/page triple for list pages.
    pub key: String,
    pub attempts: u8,
    pub reason: String,
    pub worker_id: usize,
    pub proxy_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_failure_unix: Option<i64>,
    pub last_attempt_unix: i64,
}

pub struct AuditLog {
    successes: Mutex<File>,
    deferred: Mutex<File>,
    exhausted: Mutex<File>,
}

impl AuditLog {
    /// Open the three NDJSON files under `audit_dir`.
    pub fn create(audit_dir: &Path) -> Result<Arc<Self>> {
        std::fs::create_dir_all(audit_dir).context("Failed to create audit directory")?;
        let open = |name: &str| -> Result<File> {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(audit_dir.join(name))
                .with_context(|| format!("Failed to open {name}"))
        };
        Ok(Arc::new(Self {
            successes: Mutex::new(open("successes.ndjson")?),
            deferred: Mutex::new(open("deferred.ndjson")?),
            exhausted: Mutex::new(open("failures_exhausted.ndjson")?),
        }))
    }

    pub fn success(&self, entry: &AuditEntry) {
        Self::append(&self.successes, entry);
    }

    pub fn deferral(&self, entry: &AuditEntry) {
        Self::append(&self.deferred, entry);
    }

    pub fn exhaustion(&self, entry: &AuditEntry) {
        Self::append(&self.exhausted, entry);
    }

    fn append(file: &Mutex<File>, entry: &AuditEntry) {
        let Ok(mut line) = serde_json::to_string(entry) else {
            return;
        };
        line.push('\n');
        let mut guard = file.lock();
        let _ = guard.write_all(line.as_bytes());
    }
}
