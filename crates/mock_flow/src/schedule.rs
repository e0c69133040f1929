use chrono::{DateTime, Duration, TimeZone, Timelike};
use common::models::Expiration;

/// Next wall-clock minute that is a multiple of five, strictly after `now`,
/// with seconds and sub-seconds zeroed.
pub fn next_five_minute_boundary<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Tz> {
    let floored = now.clone() - Duration::seconds(now.second() as i64)
        - Duration::nanoseconds(now.nanosecond() as i64);
    let minute = now.minute() as i64;
    let next = (minute / 5 + 1) * 5;
    floored + Duration::minutes(next - minute)
}

/// One minute from now for short expirations, the next five-minute mark otherwise.
pub fn entry_time<Tz: TimeZone>(expiration: Expiration, now: &DateTime<Tz>) -> DateTime<Tz> {
    match expiration {
        Expiration::FiveMinutes => next_five_minute_boundary(now),
        Expiration::OneMinute | Expiration::TwoMinutes => now.clone() + Duration::minutes(1),
    }
}

pub fn end_time<Tz: TimeZone>(expiration: Expiration, entry: &DateTime<Tz>) -> DateTime<Tz> {
    entry.clone() + Duration::minutes(expiration.minutes())
}

/// Protection checkpoints: one minute after entry, then one minute after that.
pub fn protections<Tz: TimeZone>(entry: &DateTime<Tz>) -> (DateTime<Tz>, DateTime<Tz>) {
    let first = entry.clone() + Duration::minutes(1);
    let second = first.clone() + Duration::minutes(1);
    (first, second)
}
