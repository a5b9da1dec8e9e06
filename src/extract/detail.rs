//! ADVIEW extraction: one detail-page payload in, one flat row out.
//!
//! Resolution order per field: structured candidate paths first, then the
//! free-text supplementation pass over the details subtrees, then derived
//! values. Structured values always win; supplementation only fills fields
//! that are still empty.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::normalize::{
    area_to_sqft, bed_bath_token, digits_only, find_state_in_address, map_tenure,
    normalize_address, normalize_furnishing, normalize_license, parse_money, CAR_PARK_RE,
};
use super::paths::{first_non_empty, first_string, lookup};
use super::rows::DetailRow;
use super::schema::DetailSchema;
use super::{make_abs, parse_data_root, ExtractError};
use crate::engine::task::{Intent, Segment};

static R_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(Individual|Strata|Master)\s+title\b").unwrap());
static R_BUMI: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(Not\s+)?Bumi\s+Lot\b").unwrap());
static R_DEV: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^Developed by\s+(.+)$").unwrap());
static R_COMPLETE_YR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:Completed|Completion)\s+in\s+(\d{4})\b").unwrap());
static R_FLOOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([\d,\.]+)\s*(?:sqft|sf)\s*floor\s*area\b").unwrap());
static R_LAND: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)([\d,\.]+)\s*(?:sqft|sf)\s*land\s*area\b").unwrap());
static R_PSF: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bRM\s*([\d\.,]+)\s*psf\b").unwrap());
static R_TENURE_TXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(Freehold|Leasehold)\s+tenure\b").unwrap());

/// Derived price-per-sqft is only computed inside these windows; anything
/// outside is assumed to be a unit mixup or a data error.
const PSF_AREA_MIN_SQFT: f64 = 400.0;
const PSF_AREA_MAX_SQFT: f64 = 20_000.0;
const PSF_PRICE_MIN: f64 = 10_000.0;
const PSF_PRICE_MAX: f64 = 50_000_000.0;

/// Context carried from the detail task into the row.
#[derive(Debug, Clone)]
pub struct DetailContext {
    pub url: String,
    pub intent: Intent,
    pub segment: Segment,
    pub listing_id: Option<String>,
}

/// Extract one detail row. Field misses become empty strings; only a
/// missing data root or undecodable payload fails the task.
pub fn extract_detail(
    json_text: &str,
    schema: &DetailSchema,
    ctx: &DetailContext,
) -> Result<DetailRow, ExtractError> {
    let data = parse_data_root(json_text)?;
    let listing = lookup(&data, "listingData").cloned().unwrap_or(Value::Null);
    let property_info = lookup(&data, "propertyOverviewData.propertyInfo")
        .cloned()
        .unwrap_or(Value::Null);

    let mut row = DetailRow {
        intent: Some(ctx.intent),
        segment: Some(ctx.segment),
        scrape_unix: Utc::now().timestamp(),
        ..DetailRow::default()
    };

    let url = make_abs(schema.domain, &first_string(&data, schema.url));
    row.url = if url.is_empty() { ctx.url.clone() } else { url };

    row.title = first_string(&data, schema.title);
    if row.title.is_empty() {
        row.title = first_string(&listing, &["property.typeText"]);
    }

    row.address = normalize_address(&first_string(&data, schema.address));
    row.state = first_string(&data, schema.state);
    if row.state.is_empty() {
        row.state = find_state_in_address(&row.address);
    }
    row.subregion = first_string(&data, schema.district);
    row.subarea = first_string(&data, schema.subarea);
    row.location = compose_location(&row.address, &row.state, &row.subregion, &row.subarea);

    row.furnishing = extract_furnishing(&data, schema);

    let listing_uuid = first_string(&listing, &["id"]);
    let listing_id = first_string(&listing, &["listingId"]);
    row.ad_id = [
        first_string(&listing, &["adId"]),
        listing_uuid,
        listing_id,
        ctx.listing_id.clone().unwrap_or_default(),
    ]
    .into_iter()
    .find(|s| !s.is_empty())
    .unwrap_or_default();

    row.price = first_non_empty(&data, schema.price).map(parse_money).unwrap_or_default();
    row.currency = first_string(&data, schema.currency);
    row.property_type = first_string(&data, schema.property_type);

    let (rooms_n, rooms_raw) = bed_bath_token(&first_string(&data, schema.rooms));
    row.rooms = rooms_n.map(|n| n.to_string()).unwrap_or(rooms_raw);
    let (toilets_n, toilets_raw) = bed_bath_token(&first_string(&data, schema.toilets));
    row.toilets = toilets_n.map(|n| n.to_string()).unwrap_or(toilets_raw);

    row.car_park = first_string(&data, schema.car_park);
    row.price_per_square_feet = digits_only(&first_string(&data, schema.psf));
    row.build_up = digits_only(&first_string(&data, schema.floor_area));
    row.land_area = digits_only(&first_string(&data, schema.land_area));
    row.tenure = map_tenure(&first_string(&data, schema.tenure));
    row.property_title = first_string(&data, schema.property_title);
    row.bumi_lot = first_string(&data, schema.bumi_lot);
    row.total_units = first_string(&data, schema.total_units);
    row.completion_year = digits_only(&first_string(&data, schema.completion_year));
    row.developer = first_string(&data, schema.developer);

    row.lister = first_string(&data, schema.lister_name);
    row.lister_url = make_abs(schema.domain, &first_string(&data, schema.lister_url));
    let phone_primary = first_string(&data, schema.phone);
    let phone_secondary = first_string(&data, schema.phone_secondary);
    row.phone_number = if phone_primary.is_empty() {
        phone_secondary
    } else {
        phone_primary
    };
    row.agency = first_string(&data, schema.agency_name);
    row.agency_registration_number = first_string(&data, schema.agency_registration);
    row.ren = {
        let raw = first_string(&data, schema.ren);
        if raw.is_empty() { raw } else { normalize_license(&raw) }
    };

    row.amenities = build_amenities(&property_info);
    row.facilities = build_facilities(&data);

    row.rent_sale = first_string(&data, schema.rent_sale);
    if row.rent_sale.is_empty() {
        row.rent_sale = ctx.intent.as_str().to_string();
    }

    let mut detail_strings = Vec::new();
    collect_detail_strings(&data, &mut detail_strings);
    fill_from_details(&detail_strings, &mut row);

    if row.car_park.is_empty() {
        if let Some(max) = scan_car_park_max(&detail_strings) {
            row.car_park = max.to_string();
        }
    }

    derive_psf(&mut row, &data, schema, ctx.intent);

    Ok(row)
}

/// `subarea, district, state` when the address resolved fully, else the
/// non-empty parts, else the address itself.
fn compose_location(address: &str, state: &str, district: &str, subarea: &str) -> String {
    if !address.is_empty() && !state.is_empty() && !district.is_empty() {
        let prefix = if subarea.is_empty() {
            String::new()
        } else {
            format!("{subarea}, ")
        };
        return format!("{prefix}{district}, {state}");
    }
    let parts: Vec<&str> = [subarea, district, state]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        address.to_string()
    } else {
        parts.join(", ")
    }
}

/// Furnishing precedence: metadata-table row with the `furnished-o` icon,
/// then the strict structured paths, then labeled detail items.
fn extract_furnishing(data: &Value, schema: &DetailSchema) -> String {
    let from_meta = furnishing_from_metatable(data);
    if !from_meta.is_empty() {
        return from_meta;
    }
    for path in schema.furnishing_strict {
        if let Some(Value::String(raw)) = lookup(data, path) {
            let val = normalize_furnishing(raw);
            if !val.is_empty() {
                return val;
            }
        }
    }
    furnishing_from_labeled_items(data)
}

fn furnishing_from_metatable(data: &Value) -> String {
    let Some(items) = lookup(data, "detailsData.metatable.items").and_then(Value::as_array)
    else {
        return String::new();
    };
    for item in items {
        let icon = first_string(item, &["icon"]).trim().to_lowercase();
        if icon != "furnished-o" {
            continue;
        }
        let title = first_string(item, &["title", "label"]);
        let value = first_string(item, &["value", "text"]);
        let candidate = if value.trim().is_empty() { title } else { value };
        let val = normalize_furnishing(&candidate);
        if !val.is_empty() {
            return val;
        }
    }
    String::new()
}

fn furnishing_from_labeled_items(data: &Value) -> String {
    let scope = lookup(data, "detailsData.details")
        .or_else(|| lookup(data, "detailsData.data"));
    let Some(scope) = scope else {
        return String::new();
    };
    let mut found = String::new();
    visit_labeled_items(scope, &mut |label, value| {
        if !found.is_empty() {
            return;
        }
        if label.to_lowercase().starts_with("furnish") {
            let val = normalize_furnishing(value);
            if !val.is_empty() {
                found = val;
            }
        }
    });
    found
}

/// Walk a subtree calling `f(label, value)` for every dict inside an
/// `items` array that carries both a label-ish and a value-ish key.
fn visit_labeled_items(node: &Value, f: &mut impl FnMut(&str, &str)) {
    match node {
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("items") {
                for item in items {
                    let label = first_string(item, &["label", "name", "title"]);
                    let value = first_string(item, &["value", "text"]);
                    if !label.trim().is_empty() && !value.trim().is_empty() {
                        f(label.trim(), value.trim());
                    }
                }
            }
            for v in map.values() {
                visit_labeled_items(v, f);
            }
        }
        Value::Array(items) => {
            for item in items {
                visit_labeled_items(item, f);
            }
        }
        _ => {}
    }
}

/// Collect every string inside items-shaped nodes: `items` arrays, and
/// lists whose key mentions detail/item, reading the value/text/label/name
/// keys of each entry. This bounds the free-text pass to the details
/// subtrees rather than the whole document.
fn collect_detail_strings(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            for (key, value) in map {
                match value {
                    Value::Object(inner) if matches!(inner.get("items"), Some(Value::Array(_))) => {
                        if let Some(Value::Array(items)) = inner.get("items") {
                            push_item_strings(items, out);
                        }
                    }
                    Value::Array(items)
                        if key.to_lowercase().contains("detail")
                            || key.to_lowercase().contains("item") =>
                    {
                        push_item_strings(items, out);
                    }
                    _ => {}
                }
                collect_detail_strings(value, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_detail_strings(item, out);
            }
        }
        _ => {}
    }
}

fn push_item_strings(items: &[Value], out: &mut Vec<String>) {
    for item in items {
        if !item.is_object() {
            continue;
        }
        for key in ["value", "text", "label", "name"] {
            if let Some(Value::String(s)) = lookup(item, key) {
                let trimmed = s.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            }
        }
    }
}

/// Fill still-empty fields from free text. First matching string wins per
/// field; structured values are never overwritten.
fn fill_from_details(strings: &[String], row: &mut DetailRow) {
    for s in strings {
        if row.property_title.is_empty() {
            if let Some(m) = R_TITLE.captures(s) {
                row.property_title = format!("{} Title", capitalize(&m[1]));
            }
        }
        if row.bumi_lot.is_empty() {
            if let Some(m) = R_BUMI.captures(s) {
                row.bumi_lot = if m.get(1).is_some() {
                    "Not Bumi Lot".to_string()
                } else {
                    "Bumi Lot".to_string()
                };
            }
        }
        if row.developer.is_empty() {
            if let Some(m) = R_DEV.captures(s) {
                row.developer = m[1].trim().to_string();
            }
        }
        if row.completion_year.is_empty() {
            if let Some(m) = R_COMPLETE_YR.captures(s) {
                row.completion_year = m[1].to_string();
            }
        }
        if row.build_up.is_empty() {
            if let Some(m) = R_FLOOR.captures(s) {
                row.build_up = digits_only(&m[1]);
            }
        }
        if row.land_area.is_empty() {
            if let Some(m) = R_LAND.captures(s) {
                row.land_area = digits_only(&m[1]);
            }
        }
        if row.price_per_square_feet.is_empty() {
            if let Some(m) = R_PSF.captures(s) {
                row.price_per_square_feet = digits_only(&m[1]);
            }
        }
        if row.tenure.is_empty() {
            if let Some(m) = R_TENURE_TXT.captures(s) {
                row.tenure = capitalize(&m[1]);
            }
        }
    }
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn scan_car_park_max(strings: &[String]) -> Option<u32> {
    let mut max = None;
    for s in strings {
        for caps in CAR_PARK_RE.captures_iter(s) {
            if let Ok(n) = caps[1].parse::<u32>() {
                max = Some(max.map_or(n, |m: u32| m.max(n)));
            }
        }
    }
    max
}

fn build_amenities(property_info: &Value) -> String {
    let Some(items) = lookup(property_info, "amenities").and_then(Value::as_array) else {
        return String::new();
    };
    let mut out = Vec::new();
    for item in items {
        if !item.is_object() {
            continue;
        }
        let unit = first_string(item, &["unit"]).trim().to_string();
        let value = first_string(item, &["value"]).trim().to_string();
        if unit.is_empty() || value.is_empty() {
            continue;
        }
        if matches!(unit.to_lowercase().as_str(), "sqft" | "sf") {
            out.push(format!("{value} {unit}"));
        } else {
            out.push(format!("{unit} {value}"));
        }
    }
    out.join("; ")
}

fn build_facilities(data: &Value) -> String {
    let Some(items) = lookup(data, "facilitiesData.data").and_then(Value::as_array) else {
        return String::new();
    };
    let texts: Vec<String> = items
        .iter()
        .filter_map(|item| match lookup(item, "text") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        })
        .collect();
    texts.join(", ")
}

/// Compute price-per-sqft for sale listings when the structured value is
/// absent and both price and built-up area landed inside their sanity
/// windows.
fn derive_psf(row: &mut DetailRow, data: &Value, schema: &DetailSchema, intent: Intent) {
    if !row.price_per_square_feet.is_empty() || intent != Intent::Sale {
        return;
    }
    let (Ok(price), Ok(area)) = (row.price.parse::<f64>(), row.build_up.parse::<f64>()) else {
        return;
    };
    let unit = first_string(data, schema.floor_area_unit);
    let area_sqft = area_to_sqft(area, &unit);
    if (PSF_AREA_MIN_SQFT..=PSF_AREA_MAX_SQFT).contains(&area_sqft)
        && (PSF_PRICE_MIN..=PSF_PRICE_MAX).contains(&price)
    {
        row.price_per_square_feet = format!("{:.2}", price / area_sqft);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn location_composition() {
        assert_eq!(
            compose_location("1 Jalan A, KL", "Kuala Lumpur", "Bangsar", "Bukit Bandaraya"),
            "Bukit Bandaraya, Bangsar, Kuala Lumpur"
        );
        assert_eq!(
            compose_location("", "Selangor", "", "SS2"),
            "SS2, Selangor"
        );
        assert_eq!(compose_location("1 Jalan B", "", "", ""), "1 Jalan B");
    }

    #[test]
    fn free_text_fill_does_not_override_structured() {
        let mut row = DetailRow {
            tenure: "Freehold".to_string(),
            ..DetailRow::default()
        };
        fill_from_details(
            &["Leasehold tenure".to_string(), "Strata title".to_string()],
            &mut row,
        );
        assert_eq!(row.tenure, "Freehold");
        assert_eq!(row.property_title, "Strata Title");
    }

    #[test]
    fn free_text_fill_covers_all_patterns() {
        let mut row = DetailRow::default();
        let strings = vec![
            "Not Bumi Lot".to_string(),
            "Developed by Acme Land Sdn Bhd".to_string(),
            "Completed in 2019".to_string(),
            "1,800 sqft floor area".to_string(),
            "3,200 sqft land area".to_string(),
            "RM 650 psf".to_string(),
            "Freehold tenure".to_string(),
        ];
        fill_from_details(&strings, &mut row);
        assert_eq!(row.bumi_lot, "Not Bumi Lot");
        assert_eq!(row.developer, "Acme Land Sdn Bhd");
        assert_eq!(row.completion_year, "2019");
        assert_eq!(row.build_up, "1800");
        assert_eq!(row.land_area, "3200");
        assert_eq!(row.price_per_square_feet, "650");
        assert_eq!(row.tenure, "Freehold");
    }

    #[test]
    fn car_park_takes_maximum_seen() {
        let strings = vec![
            "1 car park".to_string(),
            "3 parking bays".to_string(),
            "2 carparks".to_string(),
        ];
        assert_eq!(scan_car_park_max(&strings), Some(3));
        assert_eq!(scan_car_park_max(&["no parking".to_string()]), None);
    }

    #[test]
    fn amenities_render_unit_then_value_except_areas() {
        let info = json!({"amenities": [
            {"unit": "Beds", "value": "4"},
            {"unit": "sqft", "value": "2200"},
            {"unit": "Baths", "value": "3"}
        ]});
        assert_eq!(build_amenities(&info), "Beds 4; 2200 sqft; Baths 3");
    }

    #[test]
    fn derived_psf_respects_windows() {
        let schema = &crate::extract::schema::PROPERTYGURU_DETAIL;
        let data = json!({});

        let mut row = DetailRow {
            price: "1200000".to_string(),
            build_up: "1500".to_string(),
            ..DetailRow::default()
        };
        derive_psf(&mut row, &data, schema, Intent::Sale);
        assert_eq!(row.price_per_square_feet, "800.00");

        let mut below_floor = DetailRow {
            price: "9000".to_string(),
            build_up: "800".to_string(),
            ..DetailRow::default()
        };
        derive_psf(&mut below_floor, &data, schema, Intent::Sale);
        assert_eq!(below_floor.price_per_square_feet, "");

        let mut rent = DetailRow {
            price: "1200000".to_string(),
            build_up: "1500".to_string(),
            ..DetailRow::default()
        };
        derive_psf(&mut rent, &data, schema, Intent::Rent);
        assert_eq!(rent.price_per_square_feet, "");
    }

    #[test]
    fn metatable_furnishing_beats_structured_paths() {
        let data = json!({
            "detailsData": {"metatable": {"items": [
                {"icon": "furnished-o", "value": "Partly furnished"}
            ]}},
            "propertyOverviewData": {"propertyInfo": {"furnishing": "Fully Furnished"}}
        });
        assert_eq!(
            extract_furnishing(&data, &crate::extract::schema::PROPERTYGURU_DETAIL),
            "Partially Furnished"
        );
    }

    #[test]
    fn labeled_items_are_last_resort_for_furnishing() {
        let data = json!({
            "detailsData": {"details": {"sections": [
                {"items": [{"label": "Furnishing", "value": "bare"}]}
            ]}}
        });
        assert_eq!(
            extract_furnishing(&data, &crate::extract::schema::PROPERTYGURU_DETAIL),
            "Unfurnished"
        );
    }
}
