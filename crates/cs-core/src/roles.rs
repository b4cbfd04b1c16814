//! Per-event session roles relative to the target domain.
//!
//! Independently of segmentation, each event of a user is tagged with where
//! it sits in a run of target-domain activity. A row is classified from a
//! window over four URLs: the previous row's target, its own referrer and
//! target, and the next row's referrer.
//!
//! # Rules
//!
//! Rules are applied in this order and the last one that matches wins:
//!
//! | Window (prev target, referrer, target, next referrer) | Role |
//! |---|---|
//! | in, in, in, out | end |
//! | *, in, out, * | end |
//! | in, in, in, in | during |
//! | out, in, in, * | init |
//! | *, out, in, in | init |
//! | out, in, in, out | init-end |
//! | *, out, in, out | init-end |
//! | in, out, out, * and previous row not init-end | end |
//! | *, out, out, * | none |
//!
//! The previous-row check reads the role produced by the first seven rules,
//! so rows must be processed in timestamp order.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::event::{Event, sort_by_timestamp};
use crate::page::{PageUrl, TargetDomain};

/// Position of an event within a run of target-domain activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionRole {
    /// Entering the domain, with more in-domain activity to come.
    Init,
    /// Moving around inside the domain.
    During,
    /// Leaving the domain.
    End,
    /// Entering and immediately leaving.
    InitEnd,
}

impl SessionRole {
    /// String representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::During => "during",
            Self::End => "end",
            Self::InitEnd => "init-end",
        }
    }
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown role string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown session role: {0}")]
pub struct UnknownSessionRole(pub String);

impl FromStr for SessionRole {
    type Err = UnknownSessionRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "init" => Ok(Self::Init),
            "during" => Ok(Self::During),
            "end" => Ok(Self::End),
            "init-end" => Ok(Self::InitEnd),
            other => Err(UnknownSessionRole(other.to_string())),
        }
    }
}

/// An event with its lookaround context and role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleLabeledEvent {
    /// The event, with a missing referrer backfilled from the previous
    /// row's target where one exists.
    #[serde(flatten)]
    pub event: Event,
    #[serde(default)]
    pub prev_target_url: Option<PageUrl>,
    #[serde(default)]
    pub next_referrer_url: Option<PageUrl>,
    /// `None` when neither the referrer nor the target is in the domain.
    #[serde(default)]
    pub session_role: Option<SessionRole>,
}

/// Domain membership of the four URLs around one row.
#[derive(Debug, Clone, Copy)]
struct Window {
    prev_target: bool,
    referrer: bool,
    target: bool,
    next_referrer: bool,
}

type Rule = (fn(Window) -> bool, SessionRole);

/// Local rules, lowest precedence first.
const LOCAL_RULES: [Rule; 7] = [
    (
        |w| w.prev_target && w.referrer && w.target && !w.next_referrer,
        SessionRole::End,
    ),
    // Leaving the domain. Also covers exits whose previous target was
    // elsewhere, e.g. a link followed from an older tab.
    (|w| w.referrer && !w.target, SessionRole::End),
    (
        |w| w.prev_target && w.referrer && w.target && w.next_referrer,
        SessionRole::During,
    ),
    (
        |w| !w.prev_target && w.referrer && w.target,
        SessionRole::Init,
    ),
    (
        |w| !w.referrer && w.target && w.next_referrer,
        SessionRole::Init,
    ),
    (
        |w| !w.prev_target && w.referrer && w.target && !w.next_referrer,
        SessionRole::InitEnd,
    ),
    (
        |w| !w.referrer && w.target && !w.next_referrer,
        SessionRole::InitEnd,
    ),
];

impl Window {
    fn local_role(self) -> Option<SessionRole> {
        LOCAL_RULES
            .iter()
            .rev()
            .find(|(matches, _)| matches(self))
            .map(|&(_, role)| role)
    }

    /// Applies the cross-row exit override and then the none rule on top of
    /// the local role.
    fn role(
        self,
        local: Option<SessionRole>,
        previous_local: Option<SessionRole>,
    ) -> Option<SessionRole> {
        let mut role = local;
        if self.prev_target
            && !self.referrer
            && !self.target
            && previous_local != Some(SessionRole::InitEnd)
        {
            role = Some(SessionRole::End);
        }
        if !self.referrer && !self.target {
            role = None;
        }
        role
    }
}

/// Tags every event of one user with its session role.
///
/// Events may arrive in any order; the output is sorted by timestamp and
/// keeps rows whose role is `None`.
pub fn classify_roles(mut events: Vec<Event>, domain: &TargetDomain) -> Vec<RoleLabeledEvent> {
    sort_by_timestamp(&mut events);

    // An empty referrer inherits the previous row's target.
    let mut previous_target: Option<PageUrl> = None;
    for event in &mut events {
        if event.referrer_url.is_none() {
            event.referrer_url.clone_from(&previous_target);
        }
        previous_target = Some(event.target_url.clone());
    }

    let mut labeled = Vec::with_capacity(events.len());
    let mut previous_local = None;

    for i in 0..events.len() {
        let prev_target_url = i
            .checked_sub(1)
            .map(|prev| events[prev].target_url.clone());
        let next_referrer_url = events.get(i + 1).and_then(|next| next.referrer_url.clone());
        let event = &events[i];

        let window = Window {
            prev_target: domain.contains_opt(prev_target_url.as_ref()),
            referrer: domain.contains_opt(event.referrer_url.as_ref()),
            target: domain.contains(&event.target_url),
            next_referrer: domain.contains_opt(next_referrer_url.as_ref()),
        };
        let local = window.local_role();
        let session_role = window.role(local, previous_local);
        previous_local = local;

        labeled.push(RoleLabeledEvent {
            event: event.clone(),
            prev_target_url,
            next_referrer_url,
            session_role,
        });
    }

    labeled
}

/// Tags one user's events and keeps only those with a role.
pub fn label_roles(events: Vec<Event>, domain: &TargetDomain) -> Vec<RoleLabeledEvent> {
    classify_roles(events, domain)
        .into_iter()
        .filter(|e| e.session_role.is_some())
        .collect()
}
