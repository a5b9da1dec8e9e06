//! ADLIST extraction: one search-result page payload in, discovered
//! listings out.

use chrono::Utc;
use serde_json::Value;

use super::paths::{epoch_secs, first_non_empty, first_string};
use super::rows::ListingRow;
use super::schema::ListSchema;
use super::{make_abs, parse_data_root, ExtractError};
use crate::engine::task::{canonical_url, Intent, Segment};

/// Discovery context carried from the seeding task into each row.
#[derive(Debug, Clone, Copy)]
pub struct ListContext {
    pub intent: Intent,
    pub segment: Segment,
    pub page_no: u32,
}

/// Extract every listing stub from a list-page payload. Items without a URL
/// are skipped; an empty listings array is a valid (final) page.
pub fn extract_listings(
    json_text: &str,
    schema: &ListSchema,
    ctx: ListContext,
) -> Result<Vec<ListingRow>, ExtractError> {
    let data = parse_data_root(json_text)?;
    let items = first_non_empty(&data, schema.items)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let scrape_unix = Utc::now().timestamp();
    let mut rows = Vec::with_capacity(items.len());
    for item in &items {
        let url = make_abs(schema.domain, &first_string(item, schema.url));
        if url.is_empty() {
            continue;
        }
        rows.push(ListingRow {
            url: canonical_url(&url),
            title: first_string(item, schema.title),
            updated_unix: first_non_empty(item, schema.updated).and_then(epoch_secs),
            listed_unix: first_non_empty(item, schema.listed).and_then(epoch_secs),
            agent_name: first_string(item, schema.agent_name),
            agent_id: first_string(item, schema.agent_id),
            listing_id: first_string(item, schema.listing_id),
            page_no: ctx.page_no,
            intent: ctx.intent,
            segment: ctx.segment,
            scrape_unix,
        });
    }
    Ok(rows)
}
