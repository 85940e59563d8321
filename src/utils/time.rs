use crate::error::{ProcessingError, Result};
use crate::utils::constants::HST_OFFSET_SECONDS;
use chrono::{
    DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Timelike,
};

/// Hawaii-Aleutian Standard Time.
pub fn hst() -> FixedOffset {
    FixedOffset::east_opt(HST_OFFSET_SECONDS).expect("UTC-10 is a valid offset")
}

/// Attach HST to a wall-clock time.
pub fn localize_hst(naive: NaiveDateTime) -> DateTime<FixedOffset> {
    hst().from_utc_datetime(&(naive - Duration::seconds(HST_OFFSET_SECONDS as i64)))
}

/// Parse a timestamp as written by the downloader or by hand.
///
/// Accepts RFC 3339, `%Y-%m-%d %H:%M:%S%:z`, and naive `%Y-%m-%d %H:%M[:%S]`
/// (interpreted as HST). Offset-bearing values are converted to HST.
pub fn parse_hst_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    let value = value.trim();

    for format in ["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%dT%H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Ok(dt.with_timezone(&hst()));
        }
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(localize_hst(naive));
        }
    }

    Err(ProcessingError::InvalidFormat(format!(
        "Unrecognised timestamp: '{}'",
        value
    )))
}

/// Parse a `YYYY-MM` month into its first day.
pub fn parse_month(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", value.trim()), "%Y-%m-%d").map_err(|_| {
        ProcessingError::InvalidFormat(format!("Invalid month (expected YYYY-MM): '{}'", value))
    })
}

/// Last calendar day of the month starting at `month_start`.
pub fn month_end(month_start: NaiveDate) -> NaiveDate {
    let (year, month) = if month_start.month() == 12 {
        (month_start.year() + 1, 1)
    } else {
        (month_start.year(), month_start.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(month_start)
}

/// First days of every month from `first` through `last`, inclusive.
pub fn month_starts(first: NaiveDate, last: NaiveDate) -> Vec<NaiveDate> {
    let mut months = Vec::new();
    let mut current = first.with_day(1).unwrap_or(first);

    while current <= last {
        months.push(current);
        match month_end(current).succ_opt() {
            Some(next) => current = next,
            None => break,
        }
    }

    months
}

/// True when the timestamp sits exactly on a multiple of `minutes`.
pub fn is_aligned(timestamp: &DateTime<FixedOffset>, minutes: i64) -> bool {
    timestamp.second() == 0
        && timestamp.nanosecond() == 0
        && (timestamp.minute() as i64) % minutes == 0
}

/// Start of the `minutes`-wide bucket that contains the timestamp.
pub fn floor_to_minutes(timestamp: &DateTime<FixedOffset>, minutes: i64) -> DateTime<FixedOffset> {
    let width = minutes * 60;
    let local_seconds = timestamp.naive_local().and_utc().timestamp();
    let floored = local_seconds - local_seconds.rem_euclid(width);
    let naive = DateTime::from_timestamp(floored, 0)
        .map(|dt| dt.naive_utc())
        .unwrap_or_else(|| timestamp.naive_local());
    localize_hst(naive)
}

/// First hour of `year`.
pub fn year_start(year: i32) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| ProcessingError::InvalidFormat(format!("Invalid year: {}", year)))
}
