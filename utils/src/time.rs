//! Time formatting helpers.

/// Format a duration in seconds to a human-readable string.
///
/// Shows the two most significant units: `45s`, `3m 20s`, `5h 12m`, `364d 23h`.
pub fn format_duration(secs: u64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs < 86400 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else {
        format!("{}d {}h", secs / 86400, (secs % 86400) / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_two_most_significant_units() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(59), "59s");
        assert_eq!(format_duration(200), "3m 20s");
        assert_eq!(format_duration(5 * 3600 + 12 * 60 + 7), "5h 12m");
        assert_eq!(format_duration(365 * 86400 - 1), "364d 23h");
    }
}
