
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};


/// This is the standard way of converting a date to a string in punchclock.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Returns the instant a local day starts at. Days whose midnight falls into a DST gap
/// start at the first valid moment after it.
pub fn day_start<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match tz.from_local_datetime(&midnight).earliest() {
        Some(v) => v.with_timezone(&Utc),
        None => tz
            .from_local_datetime(&(midnight + chrono::Duration::hours(1)))
            .earliest()
            .map(|v| v.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight)),
    }
}

/// Compact `1h 05m` style rendering of whole minutes.
pub fn format_minutes(minutes: i64) -> String {
    if minutes >= 60 {
        format!("{}h {:02}m", minutes / 60, minutes % 60)
    } else {
        format!("{minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{day_start, format_minutes};

    #[test]
    fn formats_minutes() {
        assert_eq!(format_minutes(45), "45m");
        assert_eq!(format_minutes(105), "1h 45m");
        assert_eq!(format_minutes(600), "10h 00m");
    }

    #[test]
    fn day_start_in_utc() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert_eq!(
            day_start(date, &Utc),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }
}
