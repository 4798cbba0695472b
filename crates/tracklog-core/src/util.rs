//! Small helpers shared across the pipeline.

use time::OffsetDateTime;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    tracklog_types::datetime_to_millis(OffsetDateTime::now_utc())
}
