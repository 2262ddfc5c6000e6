/// Placeholder printed when a statistic could not be computed.
pub const NOT_APPLICABLE: &str = "n/a";

/// Fixed-point rendering with comma-grouped thousands.
///
/// A value that rounds to zero is printed without a minus sign.
///
/// # Examples
///
/// ```
/// use laptime_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(0.0, 3), "0.000");
/// assert_eq!(format_number(-0.25, 2), "-0.25");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    // Scale up by a few ulps so decimal midpoints such as 1.005, stored just
    // below the midpoint, round away from zero.
    let magnitude = value.abs() * (1.0 + 4.0 * f64::EPSILON);
    let fixed = format!("{:.*}", decimals as usize, magnitude);
    let (whole, fraction) = match fixed.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (fixed.as_str(), None),
    };

    let mut out = String::with_capacity(fixed.len() + whole.len() / 3 + 1);
    if value < 0.0 && fixed.bytes().any(|b| matches!(b, b'1'..=b'9')) {
        out.push('-');
    }
    out.push_str(&group_thousands(whole));
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

/// Format a lap or sector time in seconds as `m:ss.mmm`, or `ss.mmm` below
/// one minute.
///
/// # Examples
///
/// ```
/// use laptime_core::formatting::format_lap_time;
///
/// assert_eq!(format_lap_time(130.456), "2:10.456");
/// assert_eq!(format_lap_time(42.1), "42.100");
/// ```
pub fn format_lap_time(seconds: f64) -> String {
    let millis = (seconds.abs() * 1000.0).round() as u64;
    let minutes = millis / 60_000;
    let rem = millis % 60_000;
    let sign = if seconds < 0.0 && millis > 0 { "-" } else { "" };
    if minutes == 0 {
        format!("{sign}{}.{:03}", rem / 1000, rem % 1000)
    } else {
        format!("{sign}{minutes}:{:02}.{:03}", rem / 1000, rem % 1000)
    }
}

/// Format a value with an explicit sign, e.g. a trend slope.
///
/// ```
/// use laptime_core::formatting::format_signed;
///
/// assert_eq!(format_signed(-0.1234, 3), "-0.123");
/// assert_eq!(format_signed(0.5, 2), "+0.50");
/// assert_eq!(format_signed(0.0, 1), "0.0");
/// ```
pub fn format_signed(value: f64, decimals: u32) -> String {
    let body = format_number(value, decimals);
    if value > 0.0 && body.chars().any(|c| c.is_ascii_digit() && c != '0') {
        format!("+{body}")
    } else {
        body
    }
}

/// Format a significance probability; very small values collapse to `<0.0001`.
///
/// ```
/// use laptime_core::formatting::format_p_value;
///
/// assert_eq!(format_p_value(0.04321), "0.0432");
/// assert_eq!(format_p_value(0.0), "<0.0001");
/// ```
pub fn format_p_value(p: f64) -> String {
    if p < 0.0001 {
        "<0.0001".to_string()
    } else {
        format!("{p:.4}")
    }
}

/// Render an optional statistic, printing [`NOT_APPLICABLE`] for `None` so a
/// missing value can never be mistaken for zero.
///
/// ```
/// use laptime_core::formatting::{format_optional, format_number};
///
/// assert_eq!(format_optional(Some(0.0), |v| format_number(v, 3)), "0.000");
/// assert_eq!(format_optional(None, |v| format_number(v, 3)), "n/a");
/// ```
pub fn format_optional(value: Option<f64>, fmt: impl Fn(f64) -> String) -> String {
    value.map_or_else(|| NOT_APPLICABLE.to_string(), fmt)
}

/// `part` as a percentage of `whole`, rounded to `decimal_places`.
///
/// `None` when `whole` is zero.
///
/// ```
/// use laptime_core::formatting::percentage;
///
/// assert_eq!(percentage(50.0, 200.0, 1), Some(25.0));
/// assert_eq!(percentage(0.0, 0.0, 2), None);
/// ```
pub fn percentage(part: f64, whole: f64, decimal_places: u32) -> Option<f64> {
    (whole != 0.0).then(|| {
        let scale = 10_f64.powi(decimal_places as i32);
        (100.0 * part / whole * scale).round() / scale
    })
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── format_number ────────────────────────────────────────────────────────

    #[test]
    fn test_format_number_integer_and_fixed_zero() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(0.0, 3), "0.000");
        assert_eq!(format_number(999.0, 0), "999");
    }

    #[test]
    fn test_format_number_groups_negative_values() {
        assert_eq!(format_number(-9_876.5, 1), "-9,876.5");
        assert_eq!(format_number(-12_000.0, 0), "-12,000");
    }

    #[test]
    fn test_format_number_negative_rounding_to_zero_has_no_sign() {
        assert_eq!(format_number(-0.0001, 3), "0.000");
    }

    #[test]
    fn test_format_number_midpoint_rounds_away_from_zero() {
        assert_eq!(format_number(1.005, 2), "1.01");
        assert_eq!(format_number(182.25, 1), "182.3");
    }

    // ── format_lap_time ──────────────────────────────────────────────────────

    #[test]
    fn test_format_lap_time_over_minute() {
        assert_eq!(format_lap_time(130.456), "2:10.456");
        assert_eq!(format_lap_time(60.0), "1:00.000");
    }

    #[test]
    fn test_format_lap_time_under_minute() {
        assert_eq!(format_lap_time(39.9994), "39.999");
        assert_eq!(format_lap_time(0.0), "0.000");
    }

    #[test]
    fn test_format_lap_time_carries_into_minutes() {
        assert_eq!(format_lap_time(59.9996), "1:00.000");
    }

    // ── format_signed ────────────────────────────────────────────────────────

    #[test]
    fn test_format_signed_positive_and_negative() {
        assert_eq!(format_signed(1.25, 2), "+1.25");
        assert_eq!(format_signed(-1.25, 2), "-1.25");
    }

    #[test]
    fn test_format_signed_tiny_positive_has_no_plus() {
        assert_eq!(format_signed(0.0001, 2), "0.00");
    }

    // ── format_p_value ───────────────────────────────────────────────────────

    #[test]
    fn test_format_p_value() {
        assert_eq!(format_p_value(1.0), "1.0000");
        assert_eq!(format_p_value(0.00005), "<0.0001");
    }

    // ── format_optional ──────────────────────────────────────────────────────

    #[test]
    fn test_format_optional_distinguishes_zero_from_missing() {
        let fmt = |v: f64| format_number(v, 3);
        assert_ne!(format_optional(Some(0.0), fmt), format_optional(None, fmt));
    }

    // ── percentage ───────────────────────────────────────────────────────────

    #[test]
    fn test_percentage_of_laps_joined() {
        let p = percentage(1.0, 7.0, 1).unwrap();
        assert!((p - 14.3).abs() < 1e-9, "percentage = {p}");
        assert_eq!(percentage(12.0, 0.0, 1), None);
    }

    #[test]
    fn test_group_thousands() {
        assert_eq!(group_thousands("1234567"), "1,234,567");
        assert_eq!(group_thousands("123456"), "123,456");
        assert_eq!(group_thousands("12"), "12");
    }
}
