//! Label command: per-event session roles.

use std::collections::HashMap;
use std::io::Write;

use anyhow::{Context, Result};

use cs_core::{SessionRole, TargetDomain, label_dataset};
use cs_db::Database;

use crate::commands::write_jsonl;

const ROLE_ORDER: [SessionRole; 4] = [
    SessionRole::Init,
    SessionRole::During,
    SessionRole::End,
    SessionRole::InitEnd,
];

pub fn run<W: Write>(
    writer: &mut W,
    db: &mut Database,
    domain: &TargetDomain,
    json: bool,
) -> Result<()> {
    let events = db.list_events().context("failed to load events")?;
    let event_count = events.len();

    let labeled = label_dataset(events, domain);
    db.replace_role_labels(&labeled)
        .context("failed to store role labels")?;

    if json {
        write_jsonl(writer, &labeled)?;
        return Ok(());
    }

    let mut counts: HashMap<SessionRole, usize> = HashMap::new();
    for role in labeled.iter().filter_map(|row| row.session_role) {
        *counts.entry(role).or_default() += 1;
    }

    writeln!(
        writer,
        "Labeled {} of {event_count} events for {domain}",
        labeled.len()
    )?;
    for role in ROLE_ORDER {
        writeln!(
            writer,
            "  {:<9}{}",
            role.as_str(),
            counts.get(&role).copied().unwrap_or(0)
        )?;
    }
    Ok(())
}
