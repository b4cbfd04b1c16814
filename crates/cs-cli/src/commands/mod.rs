//! CLI subcommand implementations.

pub mod export;
pub mod import;
pub mod label;
pub mod segment;
pub mod status;

use std::io::{self, Write};

use anyhow::{Context, Result};
use serde::Serialize;

/// Writes `rows` as JSONL and returns how many were written.
///
/// A closed pipe (e.g., output piped to `head`) ends the output early without
/// an error; any other write failure is returned.
pub(crate) fn write_jsonl<W: Write, T: Serialize>(writer: &mut W, rows: &[T]) -> Result<usize> {
    let mut written = 0;
    for row in rows {
        let line = serde_json::to_string(row).context("failed to serialize row")?;
        match writeln!(writer, "{line}") {
            Ok(()) => written += 1,
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => break,
            Err(err) => return Err(err).context("failed to write row"),
        }
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts `capacity` lines, then fails every write with `kind`.
    struct FailingWriter {
        capacity: usize,
        kind: io::ErrorKind,
    }

    impl Write for FailingWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.capacity == 0 {
                return Err(io::Error::from(self.kind));
            }
            if buf.contains(&b'\n') {
                self.capacity -= 1;
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_jsonl_stops_quietly_on_broken_pipe() {
        let mut writer = FailingWriter {
            capacity: 1,
            kind: io::ErrorKind::BrokenPipe,
        };
        let written = write_jsonl(&mut writer, &[1, 2, 3]).unwrap();
        assert_eq!(written, 1);
    }

    #[test]
    fn write_jsonl_reports_other_write_errors() {
        let mut writer = FailingWriter {
            capacity: 0,
            kind: io::ErrorKind::StorageFull,
        };
        let err = write_jsonl(&mut writer, &["row"]).unwrap_err();
        assert!(err.to_string().contains("failed to write row"));
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use cs_core::{Event, RawEvent, RawTimestamp};
    use cs_db::Database;

    /// Events for one user who reaches `example.com` and leaves again.
    pub fn worked_example() -> Vec<Event> {
        [
            (1, "", "https://a.com/"),
            (2, "https://a.com/", "https://example.com/p1"),
            (3, "https://example.com/p1", "https://example.com/p2"),
            (4, "https://example.com/p2", "https://b.com/"),
        ]
        .into_iter()
        .map(|(secs, referrer, target)| {
            RawEvent {
                user_id: "U1".to_string(),
                event_timestamp: RawTimestamp::EpochSeconds(1_700_000_000 + secs),
                referrer_url: referrer.to_string(),
                target_url: target.to_string(),
                platform: "desktop".to_string(),
            }
            .validate()
            .unwrap()
        })
        .collect()
    }

    pub fn seeded_database() -> Database {
        let mut db = Database::open_in_memory().unwrap();
        db.insert_events(&worked_example()).unwrap();
        db
    }
}
