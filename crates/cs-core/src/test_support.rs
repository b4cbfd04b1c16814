//! Event builders shared by unit tests.

use crate::event::{Event, RawEvent, RawTimestamp};

/// Builds a desktop event at `secs` seconds after the epoch.
///
/// An empty `referrer` means no referrer.
pub fn event(user: &str, secs: i64, referrer: &str, target: &str) -> Event {
    event_on(user, secs, referrer, target, "desktop")
}

pub fn event_on(user: &str, secs: i64, referrer: &str, target: &str, platform: &str) -> Event {
    RawEvent {
        user_id: user.to_string(),
        event_timestamp: RawTimestamp::EpochSeconds(secs),
        referrer_url: referrer.to_string(),
        target_url: target.to_string(),
        platform: platform.to_string(),
    }
    .validate()
    .expect("test event is well-formed")
}

pub const DAY: i64 = 86_400;
