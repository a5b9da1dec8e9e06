//! Disk outputs: raw payload files and the phase CSVs.

pub mod csv;
pub mod raw;

pub use csv::{dedupe_listings, myt_timestamp, write_adlist_csv, write_adview_csv};
pub use raw::save_payload;
