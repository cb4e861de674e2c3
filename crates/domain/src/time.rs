//! Time and timestamp helpers.

use chrono::{DateTime, Local, Utc};

/// UTC timestamp attached to readings, acks and inbound messages.
///
/// Serialises as an ISO-8601 / RFC 3339 string.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Format the local wall-clock time of `ts` as `HH:MM:SS`.
#[must_use]
pub fn clock_time(ts: Timestamp) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}
