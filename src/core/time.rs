// orderlog-watcher - core/time.rs
//
// Date parsing helpers shared by the three format adapters and the
// order cache's window arithmetic.

use chrono::{Duration, NaiveDate, NaiveDateTime};

use super::super::util::constants::{DATE_STAMP_FORMAT, DOT_DATE_FORMAT};

/// Parses a bare filename-date stamp in `YYYYMMDD` form (Perso adapter).
pub fn parse_date_stamp(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_STAMP_FORMAT).ok()
}

/// Parses a dotted filename-date in `DD.MM.YYYY` form (SDC/Exchange).
pub fn parse_dot_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, DOT_DATE_FORMAT).ok()
}

/// Parses a SQL-style event date, with or without a time component.
/// Tries `YYYY-MM-DD HH:MM:SS` first, then falls back to a bare date at
/// midnight.
pub fn parse_sql_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap())
}

/// Shifts `date` by `days` (may be negative), used to derive the
/// `(Δnear, Δfar)` correlation windows.
pub fn day_delta(date: NaiveDate, days: i64) -> NaiveDate {
    date + Duration::days(days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_date_stamp() {
        assert_eq!(
            parse_date_stamp("20250101"),
            Some(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap())
        );
        assert_eq!(parse_date_stamp("not-a-date"), None);
    }

    #[test]
    fn parses_dot_date() {
        assert_eq!(
            parse_dot_date("01.02.2025"),
            Some(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap())
        );
    }

    #[test]
    fn parses_sql_datetime_with_and_without_time() {
        let with_time = parse_sql_datetime("2025-01-01 12:30:00").unwrap();
        assert_eq!(with_time.format("%H:%M:%S").to_string(), "12:30:00");

        let without_time = parse_sql_datetime("2025-01-01").unwrap();
        assert_eq!(without_time.format("%H:%M:%S").to_string(), "00:00:00");
    }

    #[test]
    fn day_delta_moves_backwards() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert_eq!(day_delta(d, -7), NaiveDate::from_ymd_opt(2025, 1, 3).unwrap());
    }
}
