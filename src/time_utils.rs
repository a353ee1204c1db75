// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Timestamp formatting for API responses.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC3339 using a `Z` suffix.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Like [`format_utc_rfc3339`], for profile fields that may be unset.
pub fn format_optional_utc(date: Option<DateTime<Utc>>) -> Option<String> {
    date.map(format_utc_rfc3339)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_uses_z_suffix() {
        let date = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        assert_eq!(format_utc_rfc3339(date), "2025-03-14T09:26:53Z");
    }

    #[test]
    fn test_unset_stays_unset() {
        assert_eq!(format_optional_utc(None), None);
    }
}
