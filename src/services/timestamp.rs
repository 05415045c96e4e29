//! Normalization of heterogeneous timestamp encodings into UTC instants

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

use crate::models::RawTimestamp;

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Export format: `May 01, 2024 at 03:15:00 PM UTC`, optionally `UTC+3`
const HUMAN_FORMAT: &str = "%B %d, %Y at %I:%M:%S %p";

/// Parses a raw timestamp; `None` when the encoding is empty or unknown
pub fn normalize(raw: &RawTimestamp) -> Option<DateTime<Utc>> {
    match raw {
        RawTimestamp::Seconds(secs) => Utc.timestamp_opt(*secs, 0).single(),
        RawTimestamp::FractionalSeconds(secs) => {
            if !secs.is_finite() {
                return None;
            }
            let whole = secs.floor();
            let nanos = ((secs - whole) * 1e9).round() as u32;
            Utc.timestamp_opt(whole as i64, nanos.min(999_999_999)).single()
        }
        RawTimestamp::Text(text) => parse_text(text),
    }
}

/// Like [`normalize`] for an optional field
pub fn normalize_opt(raw: Option<&RawTimestamp>) -> Option<DateTime<Utc>> {
    raw.and_then(normalize)
}

fn parse_text(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    let without_z = text.strip_suffix('Z').unwrap_or(text);
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(without_z, format) {
            return Some(naive.and_utc());
        }
    }

    if let Some(dt) = parse_human(text) {
        return Some(dt);
    }

    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }

    if let Ok(secs) = text.parse::<i64>() {
        return normalize(&RawTimestamp::Seconds(secs));
    }

    None
}

fn parse_human(text: &str) -> Option<DateTime<Utc>> {
    let (body, zone) = text.rsplit_once(" UTC")?;
    let naive = NaiveDateTime::parse_from_str(body, HUMAN_FORMAT).ok()?;

    let zone = zone.trim();
    if zone.is_empty() {
        return Some(naive.and_utc());
    }

    let hours: i32 = zone.parse().ok()?;
    let offset = FixedOffset::east_opt(hours * 3600)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    fn text(s: &str) -> RawTimestamp {
        RawTimestamp::Text(s.to_string())
    }

    #[test]
    fn test_rfc3339_with_offset_is_converted() {
        let dt = normalize(&text("2024-05-01T15:00:00+03:00")).unwrap();
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn test_naive_iso_with_fraction_and_z() {
        let dt = normalize(&text("2024-05-01T12:30:00.250Z")).unwrap();
        assert_eq!(dt.minute(), 30);
        assert_eq!(dt.nanosecond(), 250_000_000);

        let dt = normalize(&text("2024-05-01T12:30:00")).unwrap();
        assert_eq!(dt.hour(), 12);
    }

    #[test]
    fn test_space_separated() {
        let dt = normalize(&text("2024-05-01 08:00:00")).unwrap();
        assert_eq!(dt.hour(), 8);
    }

    #[test]
    fn test_human_export_format() {
        let dt = normalize(&text("May 01, 2024 at 03:15:00 PM UTC")).unwrap();
        assert_eq!(dt.hour(), 15);
        assert_eq!(dt.minute(), 15);

        let shifted = normalize(&text("May 01, 2024 at 03:15:00 PM UTC+3")).unwrap();
        assert_eq!(shifted.hour(), 12);
    }

    #[test]
    fn test_date_only_is_midnight() {
        let dt = normalize(&text("2024-05-01")).unwrap();
        assert_eq!(dt.day(), 1);
        assert_eq!(dt.hour(), 0);
    }

    #[test]
    fn test_unix_seconds() {
        let dt = normalize(&RawTimestamp::Seconds(1_714_564_800)).unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-05-01T12:00:00+00:00");

        let dt = normalize(&RawTimestamp::FractionalSeconds(1_714_564_800.5)).unwrap();
        assert_eq!(dt.nanosecond(), 500_000_000);

        assert_eq!(normalize(&text("1714564800")), normalize(&RawTimestamp::Seconds(1_714_564_800)));
    }

    #[test]
    fn test_unknown_encodings() {
        assert!(normalize(&text("")).is_none());
        assert!(normalize(&text("yesterday")).is_none());
        assert!(normalize(&RawTimestamp::FractionalSeconds(f64::NAN)).is_none());
        assert!(normalize_opt(None).is_none());
    }
}
