//! Import command for loading navigation events into the local `SQLite` store.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use cs_core::{Event, RawEvent};
use cs_db::Database;

/// Reads JSONL events from `reader` and stores them.
///
/// Every line is validated before anything is written, so a malformed line
/// leaves the database untouched. Rows are appended as-is, repeats included;
/// with `replace` the previous import is discarded in the same transaction.
pub fn run<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    db: &mut Database,
    replace: bool,
) -> Result<usize> {
    let events = parse_events(reader)?;
    let inserted = if replace {
        db.replace_events(&events)?
    } else {
        db.insert_events(&events)?
    };
    tracing::debug!(inserted, replace, "imported events");

    let verb = if replace { "Replaced stored events with" } else { "Imported" };
    writeln!(writer, "{verb} {inserted} events")?;
    Ok(inserted)
}

fn parse_events<R: BufRead>(reader: R) -> Result<Vec<Event>> {
    let mut events = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", idx + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let parsed: RawEvent = serde_json::from_str(trimmed)
            .with_context(|| format!("invalid JSON on line {}", idx + 1))?;
        let event = parsed
            .validate()
            .with_context(|| format!("invalid event on line {}", idx + 1))?;
        events.push(event);
    }
    Ok(events)
}
