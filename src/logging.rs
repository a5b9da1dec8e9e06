//! Per-category run log files.
//!
//! Three append-only files per run: `performance.log` for throughput and
//! lifecycle lines, `detection.log` for proxy probes and block sightings,
//! `errors.log` for failures. Line format is
//! `<ISO-ts> - Thread<N> - <message>`, one line per event.
//!
//! These complement (not replace) the `tracing` console output: the files
//! are the artifact an operator attaches to a bug report after a long run.

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub struct CategoryLogger {
    performance: Mutex<File>,
    detection: Mutex<File>,
    errors: Mutex<File>,
}

impl CategoryLogger {
    /// Create (or append to) the three category files under `logs_dir`.
    pub fn create(logs_dir: &Path) -> Result<Arc<Self>> {
        std::fs::create_dir_all(logs_dir).context("Failed to create logs directory")?;
        let open = |name: &str| -> Result<File> {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(logs_dir.join(name))
                .with_context(|| format!("Failed to open {name}"))
        };
        Ok(Arc::new(Self {
            performance: Mutex::new(open("performance.log")?),
            detection: Mutex::new(open("detection.log")?),
            errors: Mutex::new(open("errors.log")?),
        }))
    }

    pub fn performance(&self, worker: usize, message: &str) {
        Self::write_line(&self.performance, worker, message);
    }

    pub fn detection(&self, worker: usize, message: &str) {
        Self::write_line(&self.detection, worker, message);
    }

    pub fn error(&self, worker: usize, message: &str) {
        Self::write_line(&self.errors, worker, message);
    }

    fn write_line(file: &Mutex<File>, worker: usize, message: &str) {
        let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let line = format!("{ts} - Thread{worker} - {message}\n");
        let mut guard = file.lock();
        let _ = guard.write_all(line.as_bytes());
    }
}
