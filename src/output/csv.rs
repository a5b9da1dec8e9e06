//! Phase CSV assembly.
//!
//! Both files are UTF-8 with a BOM (the downstream consumer opens them in
//! Excel), header row always present. Epoch columns are rendered as UTC+8
//! wall-clock strings. The final ADVIEW CSV left-joins the ADLIST rows by
//! URL to fold in the discovery-time columns.

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, TimeZone};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::engine::task::canonical_url;
use crate::extract::rows::{DetailRow, ListingRow};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Malaysia wall clock: UTC+8, no DST.
fn myt() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("UTC+8 is a valid offset")
}

/// Render epoch seconds as a UTC+8 `YYYY-MM-DD HH:MM:SS` string; `None`
/// and out-of-range values render empty.
#[must_use]
pub fn myt_timestamp(epoch: Option<i64>) -> String {
    let Some(secs) = epoch else {
        return String::new();
    };
    match myt().timestamp_opt(secs, 0) {
        chrono::LocalResult::Single(dt) => format_myt(&dt),
        _ => String::new(),
    }
}

fn format_myt(dt: &DateTime<FixedOffset>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Drop repeat discoveries of the same listing within a category. First
/// sighting wins; order is preserved.
#[must_use]
pub fn dedupe_listings(rows: Vec<ListingRow>) -> Vec<ListingRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert((row.url.clone(), row.intent, row.segment)))
        .collect()
}

fn bom_writer(path: &Path) -> Result<csv::Writer<File>> {
    let mut file = File::create(path)
        .with_context(|| format!("Failed to create CSV {}", path.display()))?;
    file.write_all(UTF8_BOM).context("Failed to write BOM")?;
    Ok(csv::Writer::from_writer(file))
}

pub const ADLIST_COLUMNS: &[&str] = &[
    "intent",
    "segment",
    "url",
    "title",
    "updated_date",
    "listed_time",
    "scrape_date",
    "agent_name",
    "agent_id",
    "ad_id",
];

/// Write the ADLIST CSV.
pub fn write_adlist_csv(path: &Path, rows: &[ListingRow]) -> Result<()> {
    let mut writer = bom_writer(path)?;
    writer
        .write_record(ADLIST_COLUMNS)
        .context("Failed to write ADLIST header")?;
    for row in rows {
        let updated = myt_timestamp(row.updated_unix);
        let listed = myt_timestamp(row.listed_unix);
        let scraped = myt_timestamp(Some(row.scrape_unix));
        writer
            .write_record([
                row.intent.as_str(),
                row.segment.as_str(),
                row.url.as_str(),
                row.title.as_str(),
                updated.as_str(),
                listed.as_str(),
                scraped.as_str(),
                row.agent_name.as_str(),
                row.agent_id.as_str(),
                row.listing_id.as_str(),
            ])
            .context("Failed to write ADLIST row")?;
    }
    writer.flush().context("Failed to flush ADLIST CSV")?;
    Ok(())
}

pub const ADVIEW_COLUMNS: &[&str] = &[
    "url",
    "ad_id",
    "title",
    "property_type",
    "state",
    "subregion",
    "subarea",
    "location",
    "address",
    "price",
    "price_per_square_feet",
    "rooms",
    "toilets",
    "furnishing",
    "build_up",
    "land_area",
    "tenure",
    "property_title",
    "bumi_lot",
    "total_units",
    "completion_year",
    "developer",
    "lister",
    "lister_url",
    "phone_number",
    "agency",
    "agency_registration_number",
    "ren",
    "amenities",
    "facilities",
    "updated_date",
    "listed_time",
    "scrape_date",
    "agent_id",
];

/// Write the final ADVIEW CSV, left-joining ADLIST rows by URL for the
/// discovery-time columns. Detail rows whose URL never appeared in ADLIST
/// leave those four columns empty.
pub fn write_adview_csv(
    path: &Path,
    details: &[DetailRow],
    adlist: &[ListingRow],
) -> Result<()> {
    let by_url: HashMap<String, &ListingRow> = adlist
        .iter()
        .map(|row| (canonical_url(&row.url), row))
        .collect();

    let mut writer = bom_writer(path)?;
    writer
        .write_record(ADVIEW_COLUMNS)
        .context("Failed to write ADVIEW header")?;

    for detail in details {
        let seed = by_url.get(&canonical_url(&detail.url));
        let (updated, listed, scraped, agent_id) = match seed {
            Some(row) => (
                myt_timestamp(row.updated_unix),
                myt_timestamp(row.listed_unix),
                myt_timestamp(Some(row.scrape_unix)),
                row.agent_id.clone(),
            ),
            None => (String::new(), String::new(), String::new(), String::new()),
        };
        let ad_id = if detail.ad_id.is_empty() {
            seed.map(|row| row.listing_id.clone()).unwrap_or_default()
        } else {
            detail.ad_id.clone()
        };

        writer
            .write_record([
                detail.url.as_str(),
                ad_id.as_str(),
                detail.title.as_str(),
                detail.property_type.as_str(),
                detail.state.as_str(),
                detail.subregion.as_str(),
                detail.subarea.as_str(),
                detail.location.as_str(),
                detail.address.as_str(),
                detail.price.as_str(),
                detail.price_per_square_feet.as_str(),
                detail.rooms.as_str(),
                detail.toilets.as_str(),
                detail.furnishing.as_str(),
                detail.build_up.as_str(),
                detail.land_area.as_str(),
                detail.tenure.as_str(),
                detail.property_title.as_str(),
                detail.bumi_lot.as_str(),
                detail.total_units.as_str(),
                detail.completion_year.as_str(),
                detail.developer.as_str(),
                detail.lister.as_str(),
                detail.lister_url.as_str(),
                detail.phone_number.as_str(),
                detail.agency.as_str(),
                detail.agency_registration_number.as_str(),
                detail.ren.as_str(),
                detail.amenities.as_str(),
                detail.facilities.as_str(),
                updated.as_str(),
                listed.as_str(),
                scraped.as_str(),
                agent_id.as_str(),
            ])
            .context("Failed to write ADVIEW row")?;
    }
    writer.flush().context("Failed to flush ADVIEW CSV")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::task::{Intent, Segment};

    fn listing(url: &str) -> ListingRow {
        ListingRow {
            url: url.to_string(),
            title: "T".to_string(),
            updated_unix: Some(1_700_000_000),
            listed_unix: Some(1_690_000_000),
            agent_name: "A".to_string(),
            agent_id: "AG1".to_string(),
            listing_id: "L1".to_string(),
            page_no: 1,
            intent: Intent::Sale,
            segment: Segment::Residential,
            scrape_unix: 1_700_001_000,
        }
    }

    #[test]
    fn myt_rendering_is_utc_plus_8() {
        // 2023-11-14 22:13:20 UTC == 2023-11-15 06:13:20 MYT
        assert_eq!(myt_timestamp(Some(1_700_000_000)), "2023-11-15 06:13:20");
        assert_eq!(myt_timestamp(None), "");
    }

    #[test]
    fn dedupe_keeps_first_sighting_per_category() {
        let mut second = listing("https://x.my/p/1");
        second.page_no = 2;
        let mut other_intent = listing("https://x.my/p/1");
        other_intent.intent = Intent::Rent;

        let rows = dedupe_listings(vec![listing("https://x.my/p/1"), second, other_intent]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].page_no, 1);
    }

    #[test]
    fn adlist_csv_has_bom_header_and_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("adlist.csv");
        write_adlist_csv(&path, &[listing("https://x.my/p/1")]).expect("written");

        let bytes = std::fs::read(&path).expect("read");
        assert_eq!(&bytes[..3], UTF8_BOM);
        let text = String::from_utf8_lossy(&bytes[3..]).to_string();
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), ADLIST_COLUMNS.join(","));
        let row = lines.next().unwrap();
        assert!(row.starts_with("sale,residential,https://x.my/p/1,T,"));
        assert!(row.contains("2023-11-15 06:13:20"));
    }

    #[test]
    fn adview_join_folds_in_adlist_columns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("adview.csv");
        let matched = DetailRow {
            url: "https://x.my/p/1".to_string(),
            ..DetailRow::default()
        };
        let unmatched = DetailRow {
            url: "https://x.my/p/404".to_string(),
            ..DetailRow::default()
        };
        write_adview_csv(&path, &[matched, unmatched], &[listing("https://x.my/p/1")])
            .expect("written");

        let bytes = std::fs::read(&path).expect("read");
        let text = String::from_utf8_lossy(&bytes[3..]).to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].contains("2023-11-15 06:13:20"));
        assert!(lines[1].ends_with(",AG1"));
        assert!(lines[2].ends_with(",,,,"), "unmatched row leaves join columns empty");
    }
}
