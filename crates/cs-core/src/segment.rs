//! Session segmentation.
//!
//! Converts one user's flat event stream into sessions: runs of events that
//! end with an arrival at the target domain.
//!
//! # Algorithm Summary
//!
//! 1. Stable-sort by timestamp
//! 2. Drop in-site navigation (referrer and target both inside the domain)
//! 3. Every remaining arrival at the domain closes a session holding all
//!    events since the previous boundary
//! 4. A one-event session with no referrer is a direct landing and is dropped
//! 5. Events after the last arrival belong to no session
//!
//! A user whose surviving sessions hold fewer than two events in total has
//! no usable journey; [`segment_sessions`] returns `None` for them.

use std::mem;

use crate::event::{Event, sort_by_timestamp};
use crate::page::TargetDomain;
use crate::types::{SessionId, UserId};

/// A run of one user's events ending at an arrival on the target domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// `{user}_{ordinal}`, where the ordinal counts boundaries.
    pub id: SessionId,
    /// The owning user.
    pub user_id: UserId,
    /// Time-ordered events; the last one always lands on the target domain.
    pub events: Vec<Event>,
}

/// Segments one user's events into sessions.
///
/// Events may arrive in any order. Returns `None` when the user has no
/// usable session, which is an expected outcome rather than an error.
///
/// Session ordinals count every boundary, including those whose session was
/// dropped as a direct landing, so IDs stay stable for a given input.
pub fn segment_sessions(mut events: Vec<Event>, domain: &TargetDomain) -> Option<Vec<Session>> {
    let user_id = events.first()?.user_id.clone();
    debug_assert!(
        events.iter().all(|e| e.user_id == user_id),
        "segment_sessions expects a single user's events"
    );

    sort_by_timestamp(&mut events);

    let mut sessions = Vec::new();
    let mut pending: Vec<Event> = Vec::new();
    let mut boundaries = 0usize;

    for event in events {
        let arrival = domain.contains(&event.target_url);
        if arrival && domain.contains_opt(event.referrer_url.as_ref()) {
            // In-site navigation.
            continue;
        }

        pending.push(event);
        if !arrival {
            continue;
        }

        let id = SessionId::for_user(&user_id, boundaries);
        boundaries += 1;
        let session_events = mem::take(&mut pending);

        if is_direct_landing(&session_events) {
            tracing::trace!(session = %id, "dropping direct landing");
            continue;
        }

        sessions.push(Session {
            id,
            user_id: user_id.clone(),
            events: session_events,
        });
    }

    if !pending.is_empty() {
        tracing::trace!(
            user = %user_id,
            discarded = pending.len(),
            "discarding events after the last arrival"
        );
    }

    let total: usize = sessions.iter().map(|s| s.events.len()).sum();
    if total <= 1 {
        tracing::debug!(user = %user_id, boundaries, "no usable session");
        return None;
    }

    Some(sessions)
}

/// A lone arrival without a referrer carries no journey.
fn is_direct_landing(events: &[Event]) -> bool {
    matches!(events, [only] if only.referrer_url.is_none())
}
