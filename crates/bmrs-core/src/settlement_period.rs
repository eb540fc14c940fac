use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Europe::London;

/// Length of one settlement period in minutes.
pub const PERIOD_MINUTES: i64 = 30;

/// UTC instant of local (UK) midnight at the start of a settlement date.
/// UK clocks change at 01:00 UTC, so local midnight is never ambiguous.
fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    London
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| naive.and_utc())
}

/// Number of settlement periods in a settlement date:
/// 48 normally, 46 when clocks go forward, 50 when they go back.
pub fn periods_in_day(date: NaiveDate) -> u32 {
    let next = date.checked_add_days(Days::new(1)).unwrap_or(date);
    let minutes = (local_midnight(next) - local_midnight(date)).num_minutes();
    (minutes / PERIOD_MINUTES) as u32
}

/// Settlement date and 1-based period number for a UTC period start time.
pub fn settlement_period(timestamp: &DateTime<Utc>) -> (NaiveDate, u32) {
    let date = timestamp.with_timezone(&London).date_naive();
    let elapsed = (*timestamp - local_midnight(date)).num_minutes();
    (date, (elapsed / PERIOD_MINUTES) as u32 + 1)
}
