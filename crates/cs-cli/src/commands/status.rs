//! Status command for showing what the database holds.

use std::io::Write;

use anyhow::Result;

use cs_db::Database;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config) -> Result<()> {
    let counts = db.table_counts()?;

    writeln!(writer, "Clickstream status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Target domain: {}", config.target_domain)?;

    if counts.events == 0 {
        writeln!(writer, "No events imported.")?;
        return Ok(());
    }

    writeln!(writer, "Events: {} ({} users)", counts.events, counts.users)?;
    writeln!(writer, "Subsession records: {}", counts.subsession_records)?;
    writeln!(writer, "Role labels: {}", counts.role_labels)?;

    Ok(())
}
