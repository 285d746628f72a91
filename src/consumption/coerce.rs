use chrono::NaiveDate;

/// Date layouts accepted in extracts, tried in order. Day-first layouts win
/// over month-first ones; the source data is European.
const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y%m%d",
];

/// Parses heterogeneous date text. A trailing time component
/// (`2023-01-15 00:00:00`, `2023-01-15T08:30:00Z`) is ignored.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let date_part = text
        .split(|c: char| c == 'T' || c.is_whitespace())
        .next()
        .unwrap_or(text);

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

/// Lenient numeric parse: anything that is not a finite number is missing.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Leaf segment of a hierarchical usage category (`domestic/residential` →
/// `residential`). Text without the separator is returned unchanged.
pub fn usage_leaf<'a>(raw: &'a str, separator: &str) -> &'a str {
    if separator.is_empty() {
        return raw;
    }
    raw.rsplit(separator).next().unwrap_or(raw)
}
