//! Raw payload persistence.
//!
//! Every successful fetch leaves its payload JSON on disk, named after the
//! task, so the offline extractor can re-run extraction without touching
//! the site again.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::engine::task::{Task, TaskKind};

/// File name for a task's raw payload.
#[must_use]
pub fn payload_file_name(task: &Task) -> String {
    match &task.kind {
        TaskKind::ListPage {
            intent,
            segment,
            page_no,
        } => format!("{intent}_{segment}_page_{page_no}.json"),
        TaskKind::DetailPage {
            url,
            intent,
            segment,
            listing_id,
        } => {
            let tail = listing_id
                .clone()
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| sanitize_filename::sanitize(url));
            format!("adview_{intent}_{segment}_{tail}.json")
        }
    }
}

/// Write one payload under `dir`, creating the directory if needed.
pub async fn save_payload(dir: &Path, task: &Task, json_text: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .context("Failed to create payload directory")?;
    let path = dir.join(payload_file_name(task));
    tokio::fs::write(&path, json_text)
        .await
        .with_context(|| format!("Failed to write payload {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::task::{Intent, Segment};

    #[test]
    fn list_page_names_use_the_category_triple() {
        let task = Task::list_page(Intent::Sale, Segment::Residential, 12);
        assert_eq!(payload_file_name(&task), "sale_residential_page_12.json");
    }

    #[test]
    fn detail_names_prefer_listing_id_over_sanitized_url() {
        let with_id = Task::detail_page(
            "https://example.my/p/9",
            Intent::Rent,
            Segment::Commercial,
            Some("9911".to_string()),
        );
        assert_eq!(
            payload_file_name(&with_id),
            "adview_rent_commercial_9911.json"
        );

        let without_id = Task::detail_page(
            "https://example.my/p/9",
            Intent::Rent,
            Segment::Commercial,
            None,
        );
        let name = payload_file_name(&without_id);
        assert!(name.starts_with("adview_rent_commercial_"));
        assert!(!name.contains('/'));
    }

    #[tokio::test]
    async fn save_creates_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        let nested = dir.path().join("adlist_x");
        let task = Task::list_page(Intent::Sale, Segment::Residential, 1);
        let path = save_payload(&nested, &task, r#"{"ok":true}"#)
            .await
            .expect("saved");
        let text = tokio::fs::read_to_string(path).await.expect("read");
        assert_eq!(text, r#"{"ok":true}"#);
    }
}
