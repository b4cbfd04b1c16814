//! One summary record per subsession.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::links::{LinkColumns, build_link_sequence};
use crate::subsession::Subsession;
use crate::types::{SessionId, SubsessionId, UserId};

/// Summary of a subsession: how long it lasted, where it happened and the
/// path it took.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsessionRecord {
    pub subsession_id: SubsessionId,
    pub session_id: SessionId,
    pub user_id: UserId,

    /// Last event time minus first event time, in milliseconds. Never negative.
    pub duration_ms: i64,

    /// Distinct platforms in order of first appearance.
    pub platforms_used: Vec<String>,

    /// Flattened referrer/target URLs after redirect collapsing.
    pub url_link_list: Vec<Option<String>>,

    /// Same as `url_link_list`, domain only.
    pub urlloc_link_list: Vec<Option<String>>,
}

/// Aggregates one subsession.
///
/// Returns `None` for a subsession without events.
pub fn aggregate_subsession(subsession: &Subsession) -> Option<SubsessionRecord> {
    let first = subsession.events.first()?;

    // Duration uses every row, including collapsed redirects.
    let (min, max) = subsession.events.iter().fold(
        (first.event.event_timestamp, first.event.event_timestamp),
        |(min, max), timed| {
            let ts = timed.event.event_timestamp;
            (min.min(ts), max.max(ts))
        },
    );

    let mut seen = HashSet::new();
    let platforms_used = subsession
        .events
        .iter()
        .filter(|timed| seen.insert(timed.event.platform.as_str()))
        .map(|timed| timed.event.platform.clone())
        .collect();

    Some(SubsessionRecord {
        subsession_id: subsession.id.clone(),
        session_id: subsession.session_id.clone(),
        user_id: first.event.user_id.clone(),
        duration_ms: (max - min).num_milliseconds(),
        platforms_used,
        url_link_list: build_link_sequence(&subsession.events, LinkColumns::Url),
        urlloc_link_list: build_link_sequence(&subsession.events, LinkColumns::Netloc),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsession::{TimedEvent, click_gaps};
    use crate::test_support::event_on;

    fn subsession(events: Vec<crate::event::Event>) -> Subsession {
        let session_id = SessionId::new("U1_0").unwrap();
        let gaps = click_gaps(&events);
        Subsession {
            id: SubsessionId::for_session(&session_id, 0),
            session_id,
            ordinal: 0,
            events: events
                .into_iter()
                .zip(gaps)
                .map(|(event, click_gap)| TimedEvent { event, click_gap })
                .collect(),
        }
    }

    #[test]
    fn aggregates_duration_platforms_and_links() {
        let sub = subsession(vec![
            event_on("U1", 100, "", "https://a.com/", "mobile"),
            event_on("U1", 160, "https://a.com/", "https://b.com/", "desktop"),
            event_on("U1", 160, "https://b.com/", "https://c.com/", "mobile"),
            event_on("U1", 400, "https://c.com/", "https://example.com/", "tablet"),
        ]);

        let record = aggregate_subsession(&sub).unwrap();

        assert_eq!(record.subsession_id.as_str(), "U1_0__0");
        assert_eq!(record.user_id.as_str(), "U1");
        // Includes the collapsed redirect row's timestamp range.
        assert_eq!(record.duration_ms, 300_000);
        assert_eq!(record.platforms_used, vec!["mobile", "desktop", "tablet"]);
        assert_eq!(
            record.urlloc_link_list,
            vec![
                None,
                Some("a.com".to_string()),
                Some("a.com".to_string()),
                Some("b.com".to_string()),
                Some("c.com".to_string()),
                Some("example.com".to_string()),
            ]
        );
        assert_eq!(record.url_link_list.len(), record.urlloc_link_list.len());
    }

    #[test]
    fn platforms_have_no_duplicates() {
        let sub = subsession(vec![
            event_on("U1", 1, "https://a.com/", "https://b.com/", "desktop"),
            event_on("U1", 2, "https://b.com/", "https://c.com/", "desktop"),
            event_on("U1", 3, "https://c.com/", "https://example.com/", "desktop"),
        ]);
        let record = aggregate_subsession(&sub).unwrap();
        assert_eq!(record.platforms_used, vec!["desktop"]);
    }

    #[test]
    fn single_event_has_zero_duration() {
        let sub = subsession(vec![event_on(
            "U1",
            5,
            "https://a.com/",
            "https://example.com/",
            "desktop",
        )]);
        let record = aggregate_subsession(&sub).unwrap();
        assert_eq!(record.duration_ms, 0);
    }

    #[test]
    fn empty_subsession_has_no_record() {
        let sub = subsession(Vec::new());
        assert!(aggregate_subsession(&sub).is_none());
    }

    #[test]
    fn record_serializes_null_referrers() {
        let sub = subsession(vec![
            event_on("U1", 1, "", "https://a.com/", "desktop"),
            event_on("U1", 2, "https://a.com/", "https://example.com/", "desktop"),
        ]);
        let record = aggregate_subsession(&sub).unwrap();
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"subsession_id":"U1_0__0","session_id":"U1_0","user_id":"U1","duration_ms":1000,"platforms_used":["desktop"],"url_link_list":[null,"https://a.com/","https://a.com/","https://example.com/"],"urlloc_link_list":[null,"a.com","a.com","example.com"]}"#
        );
    }
}
