//! Utility functions for the matchmaking core

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Whole minutes from `now` until `until`, never negative
pub fn minutes_remaining(now: DateTime<Utc>, until: DateTime<Utc>) -> i64 {
    let remaining = (until - now).num_minutes();
    remaining.max(0)
}

/// Deadline `minutes` from `from`; `0` means no expiry and returns `None`
pub fn expiry_from_minutes(from: DateTime<Utc>, minutes: u32) -> Option<DateTime<Utc>> {
    if minutes == 0 {
        None
    } else {
        Some(from + Duration::minutes(i64::from(minutes)))
    }
}
