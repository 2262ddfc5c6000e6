use chrono::{DateTime, TimeZone, Utc};
use tracing::warn;

// ── TimestampProcessor ────────────────────────────────────────────────────────

/// Parses the timestamp column of telemetry logs.
pub struct TimestampProcessor;

impl TimestampProcessor {
    /// Attempt to parse a telemetry timestamp cell into a UTC [`DateTime`].
    ///
    /// Handles:
    /// * RFC 3339 / ISO 8601 with offset or `Z` suffix
    /// * common naive date-time patterns (interpreted as UTC)
    /// * plain numbers, read as Unix seconds (fractional part kept)
    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let s = raw.trim();
        if s.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
            return Some(dt.with_timezone(&Utc));
        }

        const FORMATS: &[&str] = &[
            "%Y-%m-%dT%H:%M:%S%.f",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M:%S%.f",
            "%Y-%m-%d %H:%M:%S",
            "%d/%m/%Y %H:%M:%S%.f",
            "%m/%d/%Y %H:%M:%S",
        ];

        for fmt in FORMATS {
            if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Utc.from_utc_datetime(&naive));
            }
        }

        if let Ok(f) = s.parse::<f64>() {
            if f.is_finite() {
                let secs = f.trunc() as i64;
                let nanos = (f.fract().abs() * 1_000_000_000.0).round() as u32;
                return DateTime::from_timestamp(secs, nanos.min(999_999_999));
            }
        }

        warn!("TimestampProcessor: could not parse timestamp \"{}\"", s);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn test_parse_rfc3339_z() {
        let dt = TimestampProcessor::parse("2025-04-26T18:02:11.625Z").unwrap();
        assert_eq!(dt.hour(), 18);
        assert_eq!(dt.nanosecond(), 625_000_000);
    }

    #[test]
    fn test_parse_with_offset() {
        let dt = TimestampProcessor::parse("2025-04-26T13:02:11-05:00").unwrap();
        assert_eq!(dt.hour(), 18);
    }

    #[test]
    fn test_parse_naive_space_separated() {
        let dt = TimestampProcessor::parse("2025-04-26 18:02:11.500").unwrap();
        assert_eq!(dt.minute(), 2);
        assert_eq!(dt.nanosecond(), 500_000_000);
    }

    #[test]
    fn test_parse_unix_seconds() {
        let dt = TimestampProcessor::parse("1745690531.25").unwrap();
        assert_eq!(dt.timestamp(), 1_745_690_531);
        assert_eq!(dt.nanosecond(), 250_000_000);
    }

    #[test]
    fn test_parse_invalid() {
        assert!(TimestampProcessor::parse("").is_none());
        assert!(TimestampProcessor::parse("yesterday").is_none());
    }
}
