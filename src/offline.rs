//! Post-hoc extraction over already-collected payload files.
//!
//! The fetch step is replaced by reading files from disk: walk a directory
//! of raw payloads (`.json`, or `.json.gz` from older runs), run the same
//! detail extraction, and write one CSV next to them. Useful for re-mining
//! a finished run after a schema fix without touching the site.

use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::engine::task::{Intent, Segment};
use crate::extract::rows::DetailRow;
use crate::extract::{extract_detail, DetailContext, DetailSchema};
use crate::output::write_adview_csv;

/// What one offline pass produced.
#[derive(Debug)]
pub struct OfflineReport {
    pub files_seen: usize,
    pub rows_extracted: usize,
    pub csv_path: PathBuf,
}

/// Walk `root`, extract every payload file, and write `out_basename` CSV
/// inside `root`.
pub fn extract_dir(
    root: &Path,
    schema: &'static DetailSchema,
    out_basename: &str,
) -> Result<OfflineReport> {
    let mut files = Vec::new();
    collect_payload_files(root, &mut files)?;

    let mut rows: Vec<DetailRow> = Vec::new();
    for path in &files {
        let text = match read_payload(path) {
            Ok(text) => text,
            Err(e) => {
                warn!("skipping {}: {e:#}", path.display());
                continue;
            }
        };
        let ctx = context_from_name(path);
        match extract_detail(&text, schema, &ctx) {
            Ok(row) => rows.push(row),
            Err(e) => warn!("skipping {}: {e}", path.display()),
        }
    }

    let csv_path = root.join(out_basename);
    write_adview_csv(&csv_path, &rows, &[])?;
    info!(
        files = files.len(),
        rows = rows.len(),
        csv = %csv_path.display(),
        "offline extraction complete"
    );
    Ok(OfflineReport {
        files_seen: files.len(),
        rows_extracted: rows.len(),
        csv_path,
    })
}

fn collect_payload_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.is_dir() {
            collect_payload_files(&path, out)?;
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if name.ends_with(".json") || name.ends_with(".json.gz") {
            out.push(path);
        }
    }
    Ok(())
}

fn read_payload(path: &Path) -> Result<String> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut text = String::new();
        GzDecoder::new(&bytes[..])
            .read_to_string(&mut text)
            .context("gzip payload undecodable")?;
        Ok(text)
    } else {
        String::from_utf8(bytes).context("payload is not UTF-8")
    }
}

/// Recover the discovery context the harvester encoded into the file name;
/// defaults are harmless because the context only seeds carry-through
/// columns.
fn context_from_name(path: &Path) -> DetailContext {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let intent = if name.contains("_rent_") {
        Intent::Rent
    } else {
        Intent::Sale
    };
    let segment = if name.contains("_commercial_") {
        Segment::Commercial
    } else {
        Segment::Residential
    };
    DetailContext {
        url: String::new(),
        intent,
        segment,
        listing_id: None,
    }
}
