//! Per-user entry points and dataset fan-out.
//!
//! Each user's events are an independent unit of work: the per-user
//! functions are pure, and the dataset functions run them across users with
//! `rayon` and concatenate the results in user order.

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::aggregate::{SubsessionRecord, aggregate_subsession};
use crate::event::Event;
use crate::page::TargetDomain;
use crate::roles::{RoleLabeledEvent, label_roles};
use crate::segment::segment_sessions;
use crate::subsession::{SplitterConfig, split_subsessions};
use crate::types::UserId;

/// Configuration shared by every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// The site whose arrivals bound sessions.
    pub target_domain: TargetDomain,
    /// Subsession splitting parameters.
    pub splitter: SplitterConfig,
}

impl PipelineConfig {
    /// Creates a configuration with default splitting parameters.
    pub fn new(target_domain: TargetDomain) -> Self {
        Self {
            target_domain,
            splitter: SplitterConfig::default(),
        }
    }
}

/// Segments one user's events and aggregates the last subsession of each
/// session.
///
/// Earlier subsessions of a session are intermediate and not reported. A
/// user without a usable session yields no records.
pub fn segment_and_aggregate(events: Vec<Event>, config: &PipelineConfig) -> Vec<SubsessionRecord> {
    let Some(sessions) = segment_sessions(events, &config.target_domain) else {
        return Vec::new();
    };

    sessions
        .into_iter()
        .filter_map(|session| {
            let mut subsessions = split_subsessions(session, &config.splitter);
            tracing::trace!(count = subsessions.len(), "split session");
            subsessions.pop()
        })
        .filter_map(|last| aggregate_subsession(&last))
        .collect()
}

/// Groups events by user, keeping input order within each user.
pub fn group_by_user(events: impl IntoIterator<Item = Event>) -> BTreeMap<UserId, Vec<Event>> {
    let mut groups: BTreeMap<UserId, Vec<Event>> = BTreeMap::new();
    for event in events {
        groups.entry(event.user_id.clone()).or_default().push(event);
    }
    groups
}

/// Runs [`segment_and_aggregate`] for every user in parallel.
pub fn segment_dataset(events: Vec<Event>, config: &PipelineConfig) -> Vec<SubsessionRecord> {
    let groups: Vec<_> = group_by_user(events).into_iter().collect();
    let users = groups.len();

    let records: Vec<SubsessionRecord> = groups
        .into_par_iter()
        .flat_map_iter(|(user, events)| {
            let records = segment_and_aggregate(events, config);
            if records.is_empty() {
                tracing::trace!(user = %user, "user has no valid session");
            }
            records
        })
        .collect();

    tracing::info!(users, records = records.len(), "segmented dataset");
    records
}

/// Runs [`label_roles`] for every user in parallel.
pub fn label_dataset(events: Vec<Event>, domain: &TargetDomain) -> Vec<RoleLabeledEvent> {
    let groups: Vec<_> = group_by_user(events).into_iter().collect();
    let users = groups.len();

    let labeled: Vec<RoleLabeledEvent> = groups
        .into_par_iter()
        .flat_map_iter(|(_, events)| label_roles(events, domain))
        .collect();

    tracing::info!(users, events = labeled.len(), "labeled dataset");
    labeled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{DAY, event, event_on};

    fn config() -> PipelineConfig {
        PipelineConfig::new(TargetDomain::new("example.com").unwrap())
    }

    #[test]
    fn worked_example_produces_one_record() {
        let events = vec![
            event("U1", 1, "", "https://a.com/"),
            event("U1", 2, "https://a.com/", "https://example.com/p1"),
            event("U1", 3, "https://example.com/p1", "https://example.com/p2"),
            event("U1", 4, "https://example.com/p2", "https://b.com/"),
        ];

        let records = segment_and_aggregate(events, &config());

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.subsession_id.as_str(), "U1_0__0");
        assert_eq!(record.session_id.as_str(), "U1_0");
        assert_eq!(record.duration_ms, 1000);
        assert_eq!(
            record.url_link_list,
            vec![
                None,
                Some("https://a.com/".to_string()),
                Some("https://a.com/".to_string()),
                Some("https://example.com/p1".to_string()),
            ]
        );
    }

    #[test]
    fn only_last_subsession_is_reported() {
        // Gaps of 0, 1, 1, 1000, 1 days.
        let events = vec![
            event_on("U2", 0, "", "https://a.com/", "desktop"),
            event_on("U2", DAY, "https://a.com/", "https://b.com/", "desktop"),
            event_on("U2", 2 * DAY, "https://b.com/", "https://c.com/", "desktop"),
            event_on("U2", 1002 * DAY, "", "https://d.com/", "mobile"),
            event_on("U2", 1003 * DAY, "https://d.com/", "https://example.com/", "mobile"),
        ];

        let records = segment_and_aggregate(events, &config());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subsession_id.as_str(), "U2_0__1");
        assert_eq!(records[0].platforms_used, vec!["mobile"]);
        assert_eq!(records[0].duration_ms, DAY * 1000);
    }

    #[test]
    fn isolated_direct_navigation_yields_nothing() {
        let events = vec![event("U3", 1, "", "https://example.com/")];
        assert!(segment_and_aggregate(events, &config()).is_empty());
    }

    #[test]
    fn records_are_never_negative_or_duplicated() {
        let events = vec![
            event_on("U4", 50, "https://b.com/", "https://example.com/", "tablet"),
            event_on("U4", 10, "", "https://a.com/", "tablet"),
            event_on("U4", 20, "https://a.com/", "https://b.com/", "desktop"),
            event_on("U4", 60, "https://example.com/", "https://c.com/", "desktop"),
            event_on("U4", 70, "https://c.com/", "https://example.com/x", "tablet"),
        ];

        for record in segment_and_aggregate(events, &config()) {
            assert!(record.duration_ms >= 0);
            let mut platforms = record.platforms_used.clone();
            platforms.sort();
            platforms.dedup();
            assert_eq!(platforms.len(), record.platforms_used.len());
        }
    }

    #[test]
    fn group_by_user_keeps_order_within_user() {
        let events = vec![
            event("B", 3, "", "https://a.com/3"),
            event("A", 1, "", "https://a.com/1"),
            event("B", 2, "", "https://a.com/2"),
        ];

        let groups = group_by_user(events);

        let users: Vec<_> = groups.keys().map(UserId::as_str).collect();
        assert_eq!(users, vec!["A", "B"]);
        let b: Vec<_> = groups[&UserId::new("B").unwrap()]
            .iter()
            .map(|e| e.target_url.as_str())
            .collect();
        assert_eq!(b, vec!["https://a.com/3", "https://a.com/2"]);
    }

    #[test]
    fn dataset_runs_users_independently() {
        let u1 = vec![
            event("U1", 1, "", "https://a.com/"),
            event("U1", 2, "https://a.com/", "https://example.com/"),
        ];
        let u2 = vec![
            event("U2", 1, "", "https://example.com/"),
            event("U2", 5, "https://x.com/", "https://y.com/"),
        ];
        let u3 = vec![
            event("U3", 7, "https://q.com/", "https://r.com/"),
            event("U3", 9, "https://r.com/", "https://www.example.com/"),
        ];

        let mut interleaved = Vec::new();
        for ((a, b), c) in u1.iter().zip(&u2).zip(&u3) {
            interleaved.extend([c.clone(), a.clone(), b.clone()]);
        }

        let dataset = segment_dataset(interleaved, &config());
        let mut expected = segment_and_aggregate(u1, &config());
        expected.extend(segment_and_aggregate(u3, &config()));

        assert_eq!(dataset, expected);
        let ids: Vec<_> = dataset.iter().map(|r| r.subsession_id.as_str()).collect();
        assert_eq!(ids, vec!["U1_0__0", "U3_0__0"]);
    }

    #[test]
    fn label_dataset_filters_unlabeled_rows() {
        let events = vec![
            event("U1", 1, "", "https://a.com/"),
            event("U2", 1, "https://a.com/", "https://example.com/"),
            event("U1", 2, "https://a.com/", "https://b.com/"),
        ];

        let labeled = label_dataset(events, &TargetDomain::new("example.com").unwrap());

        assert_eq!(labeled.len(), 1);
        assert_eq!(labeled[0].event.user_id.as_str(), "U2");
    }
}
