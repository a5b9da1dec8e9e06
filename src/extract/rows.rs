//! Flat output records produced by the two phases.

use crate::engine::task::{Intent, Segment};

/// One listing discovered on a search-result page (ADLIST output).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub url: String,
    pub title: String,
    pub updated_unix: Option<i64>,
    pub listed_unix: Option<i64>,
    pub agent_name: String,
    pub agent_id: String,
    pub listing_id: String,
    pub page_no: u32,
    pub intent: Intent,
    pub segment: Segment,
    pub scrape_unix: i64,
}

/// One extracted detail page (ADVIEW output). Every field is a normalized
/// value or the empty string; never the string "null".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailRow {
    pub url: String,
    pub ad_id: String,
    pub title: String,
    pub property_type: String,
    pub state: String,
    pub subregion: String,
    pub subarea: String,
    pub location: String,
    pub address: String,
    pub price: String,
    pub currency: String,
    pub price_per_square_feet: String,
    pub rooms: String,
    pub toilets: String,
    pub car_park: String,
    pub furnishing: String,
    pub build_up: String,
    pub land_area: String,
    pub tenure: String,
    pub property_title: String,
    pub bumi_lot: String,
    pub total_units: String,
    pub completion_year: String,
    pub developer: String,
    pub lister: String,
    pub lister_url: String,
    pub phone_number: String,
    pub agency: String,
    pub agency_registration_number: String,
    pub ren: String,
    pub amenities: String,
    pub facilities: String,
    pub rent_sale: String,
    pub intent: Option<Intent>,
    pub segment: Option<Segment>,
    pub scrape_unix: i64,
}
