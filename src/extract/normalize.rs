//! Field normalizers applied after path lookup.
//!
//! These encode the site's rendering quirks: prices arrive as numbers or as
//! "RM 1,234,567.89" strings, areas mix sqft and sqm, furnishing labels come
//! from a small vocabulary with many spellings, and state names hide inside
//! free-form addresses.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static MONEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,3}(?:,\d{3})+|\d+)(?:\.(\d+))?").unwrap());

static DIGIT_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

static BED_BATH_SUM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\d+\s*\+\s*\d+\s*$").unwrap());

static LICENSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(REN|PEA|REA)\s*[:\-]?\s*(\d{3,7})\b").unwrap());

/// `(\d+) car park / parking lot|bay|space|slot`, the forms seen in
/// metadata-table strings.
pub static CAR_PARK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*(?:car\s*park(?:s)?|carpark(?:s)?|parking\s*(?:lot|lots|bay|bays|space|spaces|slot|slots))\b")
        .unwrap()
});

/// Canonical Malaysian state names scanned for inside addresses, plus the
/// synonyms the site renders.
const STATES: &[(&str, &str)] = &[
    ("Johor", "Johor"),
    ("Kedah", "Kedah"),
    ("Kelantan", "Kelantan"),
    ("Melaka", "Melaka"),
    ("Negeri Sembilan", "Negeri Sembilan"),
    ("Pahang", "Pahang"),
    ("Perak", "Perak"),
    ("Perlis", "Perlis"),
    ("Pulau Pinang", "Pulau Pinang"),
    ("Penang", "Pulau Pinang"),
    ("Sabah", "Sabah"),
    ("Sarawak", "Sarawak"),
    ("Selangor", "Selangor"),
    ("Terengganu", "Terengganu"),
    ("W.P. Kuala Lumpur", "Kuala Lumpur"),
    ("Kuala Lumpur", "Kuala Lumpur"),
    ("Putrajaya", "Putrajaya"),
    ("Labuan", "Labuan"),
];

static STATE_RES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    STATES
        .iter()
        .map(|(name, canon)| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(name));
            (Regex::new(&pattern).unwrap(), *canon)
        })
        .collect()
});

/// Parse a money value into decimal digits, no separators, rounded to the
/// nearest integer. Accepts raw numbers and "RM 1,234,567.89"-style strings;
/// `-` and empty input yield the empty string.
#[must_use]
pub fn parse_money(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Number(n) => n
            .as_f64()
            .map(|f| format!("{}", f.round() as i64))
            .unwrap_or_default(),
        Value::String(s) => parse_money_str(s),
        _ => String::new(),
    }
}

#[must_use]
pub fn parse_money_str(s: &str) -> String {
    if s.is_empty() || s == "-" {
        return String::new();
    }
    let Some(caps) = MONEY_RE.captures(s) else {
        return String::new();
    };
    let whole = caps[1].replace(',', "");
    match caps.get(2) {
        Some(dec) => {
            let joined = format!("{whole}.{}", dec.as_str());
            joined
                .parse::<f64>()
                .map(|f| format!("{}", f.round() as i64))
                .unwrap_or(whole)
        }
        None => whole,
    }
}

/// Concatenate every digit run in the input; empty when there are none.
#[must_use]
pub fn digits_only(s: &str) -> String {
    DIGIT_RUN_RE
        .find_iter(s)
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .concat()
}

/// Single-letter tenure codes map to their long form; anything else passes
/// through unchanged.
#[must_use]
pub fn map_tenure(code: &str) -> String {
    match code.trim().to_uppercase().as_str() {
        "" => String::new(),
        "F" => "Freehold".to_string(),
        "L" => "Leasehold".to_string(),
        _ => code.to_string(),
    }
}

/// Strict furnishing whitelist. Anything outside it yields empty rather
/// than a guess.
#[must_use]
pub fn normalize_furnishing(raw: &str) -> String {
    match raw.trim().to_lowercase().as_str() {
        "bare" | "unfurnished" | "not furnished" | "non furnished" | "no furnishing" => {
            "Unfurnished".to_string()
        }
        "partly furnished" | "partially furnished" | "semi furnished" | "semi-furnished" => {
            "Partially Furnished".to_string()
        }
        "fully furnished" | "furnished" => "Fully Furnished".to_string(),
        _ => String::new(),
    }
}

/// Whole-word scan of an address for a known state name, mapped to its
/// canonical spelling.
#[must_use]
pub fn find_state_in_address(address: &str) -> String {
    if address.trim().is_empty() {
        return String::new();
    }
    for (re, canon) in STATE_RES.iter() {
        if re.is_match(address) {
            return (*canon).to_string();
        }
    }
    String::new()
}

static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static COMMA_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*,\s*").unwrap());
static TRAILING_DOT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.\s*$").unwrap());

/// Collapse whitespace, normalize comma spacing, strip a trailing period
/// and decode `&amp;`.
#[must_use]
pub fn normalize_address(s: &str) -> String {
    let s = WS_RE.replace_all(s.trim(), " ");
    let s = COMMA_RE.replace_all(&s, ", ");
    let s = TRAILING_DOT_RE.replace(&s, "");
    s.trim_end().replace("&amp;", "&")
}

/// Bed/bath tokens come as `N`, `N+M` (utility rooms counted in), or
/// `N R` / `N B`. Returns the integer count and the raw token.
#[must_use]
pub fn bed_bath_token(token: &str) -> (Option<u32>, String) {
    let raw = token.trim().to_string();
    if raw.is_empty() {
        return (None, raw);
    }
    if BED_BATH_SUM_RE.is_match(&raw) {
        let parts: Vec<u32> = DIGIT_RUN_RE
            .find_iter(&raw)
            .filter_map(|m| m.as_str().parse().ok())
            .collect();
        if parts.len() >= 2 {
            return (Some(parts[0] + parts[1]), raw);
        }
    }
    let n = DIGIT_RUN_RE
        .find(&raw)
        .and_then(|m| m.as_str().parse().ok());
    (n, raw)
}

#[must_use]
pub fn is_sqm(unit: &str) -> bool {
    let u = unit.to_lowercase();
    u.contains("sqm") || u.contains("m\u{b2}") || u.contains("sq.m") || u.contains("square meter")
}

/// Convert an area to square feet when the unit says square metres;
/// otherwise assume it already is sqft.
#[must_use]
pub fn area_to_sqft(value: f64, unit: &str) -> f64 {
    if is_sqm(unit) {
        value * 10.7639
    } else {
        value
    }
}

/// Normalize an agent license to `REN 12345` form when the input carries a
/// recognizable board prefix; otherwise pass the raw value through.
#[must_use]
pub fn normalize_license(raw: &str) -> String {
    if let Some(caps) = LICENSE_RE.captures(raw) {
        return format!("{} {}", caps[1].to_uppercase(), &caps[2]);
    }
    raw.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn money_parses_rm_strings_with_separators() {
        assert_eq!(parse_money(&json!("RM 1,234,567.89")), "1234568");
        assert_eq!(parse_money(&json!(1_234_567.49)), "1234567");
        assert_eq!(parse_money(&json!("-")), "");
        assert_eq!(parse_money(&json!("")), "");
        assert_eq!(parse_money(&json!(850_000)), "850000");
    }

    #[test]
    fn digits_only_concatenates_runs() {
        assert_eq!(digits_only("1,500 sq ft"), "1500");
        assert_eq!(digits_only("no digits"), "");
        assert_eq!(digits_only("5.50"), "550");
    }

    #[test]
    fn tenure_codes_expand() {
        assert_eq!(map_tenure("F"), "Freehold");
        assert_eq!(map_tenure("l"), "Leasehold");
        assert_eq!(map_tenure("Freehold"), "Freehold");
        assert_eq!(map_tenure(""), "");
    }

    #[test]
    fn furnishing_whitelist_is_strict() {
        assert_eq!(normalize_furnishing("bare"), "Unfurnished");
        assert_eq!(normalize_furnishing("Semi-Furnished"), "Partially Furnished");
        assert_eq!(normalize_furnishing("FULLY FURNISHED"), "Fully Furnished");
        assert_eq!(normalize_furnishing("Furnished"), "Fully Furnished");
        assert_eq!(normalize_furnishing("Fully"), "");
        assert_eq!(normalize_furnishing("luxurious"), "");
    }

    #[test]
    fn state_scan_maps_synonyms() {
        assert_eq!(
            find_state_in_address("Jalan X, Bayan Lepas, Penang 11900"),
            "Pulau Pinang"
        );
        assert_eq!(
            find_state_in_address("Mont Kiara, W.P. Kuala Lumpur"),
            "Kuala Lumpur"
        );
        assert_eq!(find_state_in_address("Orchard Road, Singapore"), "");
    }

    #[test]
    fn state_scan_requires_whole_words() {
        assert_eq!(find_state_in_address("Perakit Industrial Park"), "");
    }

    #[test]
    fn address_cleanup() {
        assert_eq!(
            normalize_address("12,  Jalan Bukit &amp; Lorong ,Georgetown ."),
            "12, Jalan Bukit & Lorong, Georgetown"
        );
    }

    #[test]
    fn bed_bath_tokens() {
        assert_eq!(bed_bath_token("3"), (Some(3), "3".to_string()));
        assert_eq!(bed_bath_token("3+1"), (Some(4), "3+1".to_string()));
        assert_eq!(bed_bath_token("4 R"), (Some(4), "4 R".to_string()));
        assert_eq!(bed_bath_token("Studio"), (None, "Studio".to_string()));
    }

    #[test]
    fn sqm_converts_to_sqft() {
        let sqft = area_to_sqft(100.0, "sqm");
        assert!((sqft - 1076.39).abs() < 0.01);
        assert_eq!(area_to_sqft(1500.0, "sq ft"), 1500.0);
    }

    #[test]
    fn license_normalizes_board_prefixes() {
        assert_eq!(normalize_license("REN:12345"), "REN 12345");
        assert_eq!(normalize_license("ren - 09876"), "REN 09876");
        assert_eq!(normalize_license("E1234"), "E1234");
    }

    #[test]
    fn car_park_regex_matches_known_forms() {
        assert!(CAR_PARK_RE.is_match("2 car parks"));
        assert!(CAR_PARK_RE.is_match("1 parking bay"));
        assert!(CAR_PARK_RE.is_match("3 Parking Lots"));
        assert!(!CAR_PARK_RE.is_match("park view"));
    }
}
