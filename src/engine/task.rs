//! Core task types for the harvesting engine.
//!
//! A [`Task`] is one unit of work: either a search-result page to enumerate
//! (ADLIST) or a listing detail page to extract (ADVIEW). Tasks carry their
//! attempt counter and which pass (primary or final sweep) admitted them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;
use url::Url;

/// Sale or rental market side of a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Sale,
    Rent,
}

impl Intent {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sale => "sale",
            Self::Rent => "rent",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Residential or commercial property segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segment {
    Residential,
    Commercial,
}

impl Segment {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Residential => "residential",
            Self::Commercial => "commercial",
        }
    }

    /// Whether this segment targets commercial inventory.
    #[must_use]
    pub const fn is_commercial(&self) -> bool {
        matches!(self, Self::Commercial)
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which pass of a stage admitted the task.
///
/// Deferred tasks re-enter the ready queue exactly once, tagged `FinalSweep`;
/// a failure on that pass is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Pass {
    Primary,
    FinalSweep,
}

/// The two kinds of work the engine schedules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    /// One paginated search-result page of a category.
    ListPage {
        intent: Intent,
        segment: Segment,
        page_no: u32,
    },
    /// One listing detail page, carrying through its discovery context.
    DetailPage {
        url: String,
        intent: Intent,
        segment: Segment,
        listing_id: Option<String>,
    },
}

/// Stable identity of a task: the unit of deduplication and completion
/// tracking within a stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskKey {
    ListPage(Intent, Segment, u32),
    DetailPage(String),
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListPage(intent, segment, page) => {
                write!(f, "{intent}_{segment}_page_{page}")
            }
            Self::DetailPage(url) => f.write_str(url),
        }
    }
}

/// Strip query, fragment and trailing slash so one listing resolves to one
/// key regardless of how its URL was discovered.
#[must_use]
pub fn canonical_url(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string().trim_end_matches('/').to_string()
        }
        Err(_) => {
            // Site-relative link; keys still need to be stable.
            let no_fragment = trimmed.split('#').next().unwrap_or(trimmed);
            let no_query = no_fragment.split('?').next().unwrap_or(no_fragment);
            no_query.trim_end_matches('/').to_string()
        }
    }
}

/// One unit of work flowing through a [`Stage`](super::stage::Stage).
#[derive(Debug, Clone)]
pub struct Task {
    pub kind: TaskKind,
    /// 1-based attempt counter; the retry policy is keyed on it.
    pub attempt: u8,
    pub pass: Pass,
    /// Set when the task sits on the delayed heap.
    pub ready_at: Option<Instant>,
    /// Unix time of the first failed attempt, carried for audit entries.
    pub first_failure_unix: Option<i64>,
    /// Most recent failure description, carried for audit entries.
    pub last_error: Option<String>,
}

impl Task {
    #[must_use]
    pub fn list_page(intent: Intent, segment: Segment, page_no: u32) -> Self {
        Self::new(TaskKind::ListPage {
            intent,
            segment,
            page_no,
        })
    }

    #[must_use]
    pub fn detail_page(
        url: impl Into<String>,
        intent: Intent,
        segment: Segment,
        listing_id: Option<String>,
    ) -> Self {
        Self::new(TaskKind::DetailPage {
            url: canonical_url(&url.into()),
            intent,
            segment,
            listing_id,
        })
    }

    fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            attempt: 1,
            pass: Pass::Primary,
            ready_at: None,
            first_failure_unix: None,
            last_error: None,
        }
    }

    #[must_use]
    pub fn key(&self) -> TaskKey {
        match &self.kind {
            TaskKind::ListPage {
                intent,
                segment,
                page_no,
            } => TaskKey::ListPage(*intent, *segment, *page_no),
            TaskKind::DetailPage { url, .. } => TaskKey::DetailPage(url.clone()),
        }
    }

    #[must_use]
    pub const fn intent(&self) -> Intent {
        match &self.kind {
            TaskKind::ListPage { intent, .. } | TaskKind::DetailPage { intent, .. } => *intent,
        }
    }

    #[must_use]
    pub const fn segment(&self) -> Segment {
        match &self.kind {
            TaskKind::ListPage { segment, .. } | TaskKind::DetailPage { segment, .. } => *segment,
        }
    }

    /// URL this task fetches. List pages are rendered from the configured
    /// template by the worker; detail pages carry their own URL.
    #[must_use]
    pub fn detail_url(&self) -> Option<&str> {
        match &self.kind {
            TaskKind::DetailPage { url, .. } => Some(url),
            TaskKind::ListPage { .. } => None,
        }
    }

    /// Record a failed attempt for the audit trail.
    pub fn note_failure(&mut self, reason: &str, now_unix: i64) {
        if self.first_failure_unix.is_none() {
            self.first_failure_unix = Some(now_unix);
        }
        self.last_error = Some(reason.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_url_strips_query_fragment_and_slash() {
        assert_eq!(
            canonical_url("https://example.my/p/123?src=srp#gallery"),
            "https://example.my/p/123"
        );
        assert_eq!(
            canonical_url("https://example.my/p/123/"),
            "https://example.my/p/123"
        );
    }

    #[test]
    fn list_and_detail_keys_are_distinct() {
        let a = Task::list_page(Intent::Sale, Segment::Residential, 3);
        let b = Task::detail_page(
            "https://example.my/p/3",
            Intent::Sale,
            Segment::Residential,
            None,
        );
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), TaskKey::ListPage(Intent::Sale, Segment::Residential, 3));
    }

    #[test]
    fn note_failure_keeps_first_timestamp() {
        let mut task = Task::list_page(Intent::Rent, Segment::Commercial, 1);
        task.note_failure("timeout", 100);
        task.note_failure("blocked", 200);
        assert_eq!(task.first_failure_unix, Some(100));
        assert_eq!(task.last_error.as_deref(), Some("blocked"));
    }
}
