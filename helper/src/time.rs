//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// The current UNIX timestamp, in seconds.
pub fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the epoch")
        .as_secs()
}
