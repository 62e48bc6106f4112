// In crates/screening/src/calendar.rs

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Weekday};

/// Monthly options stop trading at the end of their expiration day.
const EXPIRATION_TIME: (u32, u32, u32) = (23, 59, 59);

/// Interprets a wall-clock time in the local zone. Times skipped by a DST
/// transition are read as UTC.
pub fn to_local(naive: NaiveDateTime) -> DateTime<Local> {
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| Local.from_utc_datetime(&naive))
}

/// The third Friday of a month, or `None` for an invalid month.
pub fn third_friday(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let weekday = first.weekday().num_days_from_monday();
    let day = if weekday < Weekday::Sat.num_days_from_monday() {
        19 - weekday
    } else {
        26 - weekday
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// The instant the monthly contracts of a month expire.
///
/// April 2022 expired on Thursday the 14th (Good Friday closure).
pub fn monthly_expiration(year: i32, month: u32) -> Option<NaiveDateTime> {
    let date = if (year, month) == (2022, 4) {
        NaiveDate::from_ymd_opt(2022, 4, 14)?
    } else {
        third_friday(year, month)?
    };
    let (h, m, s) = EXPIRATION_TIME;
    Some(date.and_time(NaiveTime::from_hms_opt(h, m, s)?))
}

/// The first monthly expiration strictly after `now`, in local wall-clock time.
pub fn next_monthly_expiration_naive(now: NaiveDateTime) -> NaiveDateTime {
    let (year, month) = (now.year(), now.month());
    match monthly_expiration(year, month) {
        Some(this_month) if now < this_month => this_month,
        _ => {
            let (year, month) = if month < 12 { (year, month + 1) } else { (year + 1, 1) };
            // Every (year, month) pair built here is valid.
            monthly_expiration(year, month).unwrap_or(now)
        }
    }
}

pub fn next_monthly_expiration(now: DateTime<Local>) -> DateTime<Local> {
    to_local(next_monthly_expiration_naive(now.naive_local()))
}

/// Expiration used for answers that should effectively never be recomputed,
/// such as a symbol the brokerage does not know.
pub fn sentinel_expiration() -> i64 {
    NaiveDate::from_ymd_opt(2037, 12, 31)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| to_local(naive).timestamp())
        .unwrap_or(i64::MAX)
}
