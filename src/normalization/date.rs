use chrono::NaiveDate;

/// Formats the portal has been seen to render the trading date in, tried in order.
const KNOWN_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d-%m-%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%b-%Y",
    "%d %b %Y",
    "%d-%b-%y",
];

/// Canonical key form of a listing date.
///
/// Recognised layouts are rewritten to ISO `yyyy-mm-dd` so a formatting change on
/// the portal does not fork the `(region, market, commodity, date)` key. Anything
/// unrecognised is kept verbatim (trimmed).
pub fn canonical_date(raw: &str) -> String {
    let trimmed = raw.trim();
    KNOWN_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| trimmed.to_string())
}
