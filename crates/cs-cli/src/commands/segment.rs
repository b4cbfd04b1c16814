//! Segment command: sessions, subsessions and one record per session.

use std::collections::HashSet;
use std::io::Write;

use anyhow::{Context, Result};

use cs_core::{PipelineConfig, segment_dataset};
use cs_db::Database;

use crate::commands::write_jsonl;

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    pipeline: &PipelineConfig,
    json: bool,
) -> Result<()> {
    let events = db.list_events().context("failed to load events")?;
    let event_count = events.len();
    let users = events.iter().map(|e| &e.user_id).collect::<HashSet<_>>().len();

    let records = segment_dataset(events, pipeline);
    db.replace_subsession_records(&records)
        .context("failed to store subsession records")?;

    if json {
        write_jsonl(writer, &records)?;
        return Ok(());
    }

    writeln!(
        writer,
        "Segmented {event_count} events from {users} users into {} subsession records",
        records.len()
    )?;
    writeln!(writer, "Target domain: {}", pipeline.target_domain)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use cs_core::TargetDomain;
    use insta::assert_snapshot;

    use crate::commands::test_support::seeded_database;

    fn pipeline() -> PipelineConfig {
        PipelineConfig::new(TargetDomain::new("example.com").unwrap())
    }

    #[test]
    fn segment_command_stores_records() {
        let mut db = seeded_database();
        let mut output = Vec::new();

        run(&mut output, &mut db, &pipeline(), false).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Segmented 4 events from 1 users into 1 subsession records
        Target domain: example.com
        ");
        assert_eq!(db.table_counts().unwrap().subsession_records, 1);
    }

    #[test]
    fn segment_command_prints_jsonl() {
        let mut db = seeded_database();
        let mut output = Vec::new();

        run(&mut output, &mut db, &pipeline(), true).unwrap();

        assert_snapshot!(String::from_utf8(output).unwrap(), @r#"{"subsession_id":"U1_0__0","session_id":"U1_0","user_id":"U1","duration_ms":1000,"platforms_used":["desktop"],"url_link_list":[null,"https://a.com/","https://a.com/","https://example.com/p1"],"urlloc_link_list":[null,"a.com","a.com","example.com"]}"#);
    }

    #[test]
    fn rerunning_replaces_previous_records() {
        let mut db = seeded_database();
        run(&mut Vec::new(), &mut db, &pipeline(), false).unwrap();

        let other = PipelineConfig::new(TargetDomain::new("nowhere.org").unwrap());
        run(&mut Vec::new(), &mut db, &other, false).unwrap();

        assert_eq!(db.table_counts().unwrap().subsession_records, 0);
    }
}
