//! Human-readable formatting for CLI summaries.

use std::time::Duration;

use chrono::{DateTime, Utc};

const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

/// Formats a byte count using binary units, e.g. `1.50 KB`.
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.2} {}", UNITS[unit])
    }
}

/// Formats an elapsed time, e.g. `850ms`, `4.2s`, `1m 05s`.
#[must_use]
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{secs}.{}s", d.subsec_millis() / 100)
    } else {
        format!("{}ms", d.as_millis())
    }
}

/// Formats a fraction in `0.0..=1.0` as a percentage with one decimal.
#[must_use]
pub fn format_ratio(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Formats how long ago `then` was relative to `now`, e.g. `3h ago`.
#[must_use]
pub fn format_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    match secs {
        s if s < 60 => "just now".to_string(),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3600),
        s => format!("{}d ago", s / 86_400),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn bytes_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1_048_576), "1.00 MB");
        assert_eq!(format_bytes(1_073_741_824), "1.00 GB");
        assert_eq!(format_bytes(2 * 1_099_511_627_776), "2048.00 GB");
    }

    #[test]
    fn elapsed_units() {
        assert_eq!(format_elapsed(Duration::from_millis(850)), "850ms");
        assert_eq!(format_elapsed(Duration::from_millis(4_250)), "4.2s");
        assert_eq!(format_elapsed(Duration::from_secs(65)), "1m 05s");
    }

    #[test]
    fn ratio() {
        assert_eq!(format_ratio(0.0), "0.0%");
        assert_eq!(format_ratio(0.755), "75.5%");
        assert_eq!(format_ratio(1.0), "100.0%");
    }

    #[test]
    fn since() {
        let now = Utc::now();
        assert_eq!(format_since(now, now), "just now");
        assert_eq!(format_since(now - TimeDelta::minutes(5), now), "5m ago");
        assert_eq!(format_since(now - TimeDelta::hours(3), now), "3h ago");
        assert_eq!(format_since(now - TimeDelta::days(2), now), "2d ago");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn bytes_never_panics(bytes in 0u64..u64::MAX) {
                let s = format_bytes(bytes);
                prop_assert!(UNITS.iter().any(|u| s.ends_with(u)));
            }

            #[test]
            fn elapsed_never_panics(millis in 0u64..1_000_000_000) {
                let _ = format_elapsed(Duration::from_millis(millis));
            }
        }
    }
}
