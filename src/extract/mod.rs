//! Extraction layer: embedded payload JSON in, flat records out.
//!
//! Pure functions, no I/O. The worker treats `MissingRoot` and `Parse` the
//! same as a transport failure, because a payload without the designated
//! subtree is indistinguishable from a soft block.

pub mod detail;
pub mod list;
pub mod normalize;
pub mod paths;
pub mod rows;
pub mod schema;

use serde_json::Value;
use thiserror::Error;

pub use detail::{extract_detail, DetailContext};
pub use list::{extract_listings, ListContext};
pub use rows::{DetailRow, ListingRow};
pub use schema::{DetailSchema, ListSchema, PROPERTYGURU_DETAIL, PROPERTYGURU_LIST};

/// Extraction failures that fail the whole task (and so feed the retry
/// policy). Per-field misses never surface here; they become empty columns.
#[derive(Debug, Clone, Error)]
pub enum ExtractError {
    #[error("payload JSON did not parse: {0}")]
    Parse(String),
    #[error("designated data subtree missing from payload")]
    MissingRoot,
}

/// The designated subtree all field paths are evaluated against.
const DATA_ROOT_PATH: &str = "props.pageProps.pageData.data";

/// Locate the listing data subtree inside a parsed payload document.
///
/// Accepts the full Next.js document, a list of candidate documents, or an
/// already-unwrapped data object (recognized by its two signature keys).
#[must_use]
pub fn find_data_root(doc: &Value) -> Option<&Value> {
    if let Value::Array(items) = doc {
        return items.iter().find_map(find_data_root);
    }
    if let Some(data) = paths::lookup(doc, DATA_ROOT_PATH) {
        if data.is_object() && !paths::is_empty(data) {
            return Some(data);
        }
    }
    if let Value::Object(map) = doc {
        if map.contains_key("listingData") && map.contains_key("propertyOverviewData") {
            return Some(doc);
        }
    }
    None
}

/// Parse payload text and resolve the data root in one step.
pub fn parse_data_root(json_text: &str) -> Result<Value, ExtractError> {
    let doc: Value =
        serde_json::from_str(json_text).map_err(|e| ExtractError::Parse(e.to_string()))?;
    find_data_root(&doc).cloned().ok_or(ExtractError::MissingRoot)
}

/// Prefix site-relative links with the schema's domain.
#[must_use]
pub fn make_abs(domain: &str, url: &str) -> String {
    if url.is_empty() || url.starts_with("http") {
        url.to_string()
    } else {
        format!("{domain}{url}")
    }
}
