use chrono::{TimeZone, Utc};

use crate::decode::{self, DecodeError};

// Helpers that turn decoded numbers into the strings the dashboard shows.

const COMPACT_UNITS: [(f64, &str); 4] = [(1e3, "K"), (1e6, "M"), (1e9, "B"), (1e12, "T")];

fn trim_zeros(formatted: String) -> String {
    if !formatted.contains('.') {
        return formatted;
    }
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Compact notation: `1234.0` with one decimal is `"1.2K"`, `0.456` with two is `"0.46"`.
pub fn format_compact(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return "N/A".to_string();
    }
    let sign = if value < 0.0 { "-" } else { "" };
    let magnitude = value.abs();

    let mut unit = COMPACT_UNITS
        .iter()
        .rposition(|(threshold, _)| magnitude >= *threshold);
    let scaled = loop {
        let divisor = unit.map_or(1.0, |i| COMPACT_UNITS[i].0);
        let rounded = format!("{:.*}", decimals, magnitude / divisor);
        // 999_950 at one decimal rounds to "1000.0" thousands; carry into the next unit.
        let next = unit.map_or(0, |i| i + 1);
        let carries = rounded.parse::<f64>().is_ok_and(|r| r >= 1000.0);
        if carries && next < COMPACT_UNITS.len() {
            unit = Some(next);
            continue;
        }
        break trim_zeros(rounded);
    };

    if scaled == "0" {
        // Rounds away entirely; don't render "-0".
        return scaled;
    }
    let suffix = unit.map_or("", |i| COMPACT_UNITS[i].1);
    format!("{}{}{}", sign, scaled, suffix)
}

/// Signed compact notation for changes between two readings.
pub fn format_delta(delta: f64, decimals: usize) -> String {
    let formatted = format_compact(delta, decimals);
    if delta > 0.0 && formatted != "0" {
        format!("+{}", formatted)
    } else {
        formatted
    }
}

/// Relative change in percent. `None` when there is no baseline.
pub fn percent_change(previous: f64, current: f64) -> Option<f64> {
    if previous == 0.0 || !previous.is_finite() || !current.is_finite() {
        return None;
    }
    Some((current - previous) / previous.abs() * 100.0)
}

/// Formats a Shannon amount as CKB: `"1.0 CKB"` below a thousand, compact above.
pub fn format_ckb(shannon: u128) -> String {
    let ckb = decode::shannon_to_ckb(shannon);
    if ckb >= 1000.0 {
        format!("{} CKB", format_compact(ckb, 2))
    } else if ckb.fract() == 0.0 {
        format!("{:.1} CKB", ckb)
    } else {
        format!("{} CKB", trim_zeros(format!("{:.8}", ckb)))
    }
}

/// Converts a millisecond Unix timestamp into an RFC 3339 string.
pub fn format_timestamp(ts_millis: u64) -> String {
    let datetime = i64::try_from(ts_millis)
        .ok()
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single());

    if let Some(dt) = datetime {
        dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    } else {
        "Invalid Timestamp".to_string()
    }
}

/// Decoded value, or zero with a warning.
pub fn decode_or_zero<T: Default>(field: &str, decoded: Result<T, DecodeError>) -> T {
    decoded.unwrap_or_else(|e| {
        log::warn!("Failed to decode {}: {}", field, e);
        T::default()
    })
}

/// Rendered value, or `"N/A"` with a warning.
pub fn display_or_na<T>(
    field: &str,
    decoded: Result<T, DecodeError>,
    render: impl FnOnce(T) -> String,
) -> String {
    match decoded {
        Ok(value) => render(value),
        Err(e) => {
            log::warn!("Failed to decode {}: {}", field, e);
            "N/A".to_string()
        }
    }
}

pub fn or_unknown(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => "Unknown".to_string(),
    }
}
