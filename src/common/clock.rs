use time::OffsetDateTime;

/// Wall-clock time as epoch milliseconds, the unit stored on records.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
