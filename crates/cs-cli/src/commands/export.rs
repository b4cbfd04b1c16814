//! Implementation of the `cs export` command.
//!
//! Writes one stored result table to the given writer as JSONL.

use std::io::Write;

use anyhow::Result;

use cs_db::Database;

use crate::ExportTable;
use crate::commands::write_jsonl;

/// Exports `table` and returns the number of rows written.
pub fn run<W: Write>(writer: &mut W, db: &Database, table: ExportTable) -> Result<usize> {
    match table {
        ExportTable::Records => write_jsonl(writer, &db.list_subsession_records()?),
        ExportTable::Roles => write_jsonl(writer, &db.list_role_labels()?),
    }
}
