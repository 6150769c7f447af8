//! Key naming for the fast-store keyspace.
//!
//! Keys are deterministic from the date, and the date is recoverable by
//! parsing the key; the sync worker relies on that to map dirty keys back
//! to record-store rows.

use chrono::{Datelike, NaiveDate};

/// Field names of the metadata hash.
pub mod meta_field {
    /// The limit the day started with.
    pub const INITIAL_LIMIT: &str = "initial_limit";
    /// Amount consumed so far.
    pub const CONSUMED: &str = "consumed";
    /// Number of successful consume transactions.
    pub const TRANSACTION_COUNT: &str = "transaction_count";
    /// Write counter as of the last warm.
    pub const VERSION: &str = "version";
    /// The calendar date, ISO formatted.
    pub const DAY_DATE: &str = "day_date";
}

/// The remaining-key name for a date: `<prefix>:remaining:YYYY:MM:DD`.
#[must_use]
pub fn remaining_key(prefix: &str, date: NaiveDate) -> String {
    format!(
        "{prefix}:remaining:{:04}:{:02}:{:02}",
        date.year(),
        date.month(),
        date.day()
    )
}

/// The meta-key name for a date: `<prefix>:meta:YYYY:MM:DD`.
#[must_use]
pub fn meta_key(prefix: &str, date: NaiveDate) -> String {
    format!(
        "{prefix}:meta:{:04}:{:02}:{:02}",
        date.year(),
        date.month(),
        date.day()
    )
}

/// Recover the date from a remaining-key name.
///
/// Parses from the end so a prefix containing `:` cannot shift the date
/// segments. Returns `None` for anything that is not a well-formed
/// remaining key.
#[must_use]
pub fn date_from_remaining_key(key: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = key.split(':').collect();
    if parts.len() < 5 {
        return None;
    }
    let tail = &parts[parts.len() - 4..];
    if tail[0] != "remaining" {
        return None;
    }
    let year: i32 = tail[1].parse().ok()?;
    let month: u32 = tail[2].parse().ok()?;
    let day: u32 = tail[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn key_formats() {
        let d = date("2024-01-05");
        assert_eq!(remaining_key("limits", d), "limits:remaining:2024:01:05");
        assert_eq!(meta_key("limits", d), "limits:meta:2024:01:05");
    }

    #[test]
    fn date_roundtrip() {
        let d = date("2025-03-15");
        let key = remaining_key("limits", d);
        assert_eq!(date_from_remaining_key(&key), Some(d));
    }

    #[test]
    fn prefix_with_colon_still_parses() {
        let d = date("2025-12-31");
        let key = remaining_key("acme:prod", d);
        assert_eq!(date_from_remaining_key(&key), Some(d));
    }

    #[test]
    fn rejects_non_remaining_keys() {
        assert_eq!(date_from_remaining_key("limits:meta:2025:03:15"), None);
        assert_eq!(date_from_remaining_key("limits:remaining:2025:13:15"), None);
        assert_eq!(date_from_remaining_key("garbage"), None);
    }
}
