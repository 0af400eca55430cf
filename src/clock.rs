//! Monotonic-enough wall clock used to stamp local arrival times.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current Unix epoch time in milliseconds.
///
/// Every component that needs `local_timestamp` goes through this instead
/// of reading the system clock directly.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_millis() as i64
}
