//! Clickstream events: the raw table row and its validated form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::page::PageUrl;
use crate::types::UserId;

/// A row that could not be turned into an [`Event`].
///
/// Malformed rows are surfaced to the caller rather than dropped, since a
/// silently skipped navigation would shift every later session boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MalformedEventError {
    /// The row has no user ID.
    #[error("event has an empty user ID")]
    MissingUserId,

    /// The row has no target URL.
    #[error("event for user {user_id} has an empty target URL")]
    MissingTargetUrl { user_id: String },

    /// A URL column could not be parsed as an absolute URL.
    #[error("event for user {user_id} has an invalid {field}: {value:?} ({source})")]
    InvalidUrl {
        user_id: String,
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },

    /// The timestamp is neither RFC 3339 nor representable epoch seconds.
    #[error("event for user {user_id} has an invalid timestamp: {value}")]
    InvalidTimestamp { user_id: String, value: String },
}

/// A timestamp as it appears in an event log: RFC 3339 text or epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Seconds since the Unix epoch.
    EpochSeconds(i64),
    /// An RFC 3339 string such as `2024-01-15T10:30:00Z`.
    Text(String),
}

impl RawTimestamp {
    fn parse(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::EpochSeconds(secs) => DateTime::from_timestamp(*secs, 0),
            Self::Text(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
        }
    }
}

impl std::fmt::Display for RawTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EpochSeconds(secs) => write!(f, "{secs}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// One navigation row of a clickstream log, before validation.
///
/// An empty `referrer_url` means the navigation had no referrer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawEvent {
    pub user_id: String,
    pub event_timestamp: RawTimestamp,
    #[serde(default)]
    pub referrer_url: String,
    pub target_url: String,
    #[serde(default)]
    pub platform: String,
}

impl RawEvent {
    /// Validates the row into an [`Event`].
    pub fn validate(self) -> Result<Event, MalformedEventError> {
        let user_id =
            UserId::new(self.user_id).map_err(|_| MalformedEventError::MissingUserId)?;

        let event_timestamp =
            self.event_timestamp
                .parse()
                .ok_or_else(|| MalformedEventError::InvalidTimestamp {
                    user_id: user_id.to_string(),
                    value: self.event_timestamp.to_string(),
                })?;

        if self.target_url.trim().is_empty() {
            return Err(MalformedEventError::MissingTargetUrl {
                user_id: user_id.to_string(),
            });
        }
        let target_url = parse_url(&user_id, "target URL", self.target_url)?;

        let referrer_url = if self.referrer_url.trim().is_empty() {
            None
        } else {
            Some(parse_url(&user_id, "referrer URL", self.referrer_url)?)
        };

        Ok(Event {
            user_id,
            event_timestamp,
            referrer_url,
            target_url,
            platform: self.platform,
        })
    }
}

fn parse_url(
    user_id: &UserId,
    field: &'static str,
    value: String,
) -> Result<PageUrl, MalformedEventError> {
    PageUrl::parse(value.clone()).map_err(|source| MalformedEventError::InvalidUrl {
        user_id: user_id.to_string(),
        field,
        value,
        source,
    })
}

/// A validated navigation event.
///
/// Events are immutable once read; every pipeline stage works on its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// The user who navigated.
    pub user_id: UserId,
    /// When the navigation happened.
    pub event_timestamp: DateTime<Utc>,
    /// Where the navigation came from; `None` when there was no referrer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub referrer_url: Option<PageUrl>,
    /// Where the navigation went.
    pub target_url: PageUrl,
    /// Device or client platform, e.g. `desktop` or `mobile`.
    pub platform: String,
}

/// Stable sort by timestamp; ties keep their input order.
pub(crate) fn sort_by_timestamp(events: &mut [Event]) {
    events.sort_by_key(|e| e.event_timestamp);
}
