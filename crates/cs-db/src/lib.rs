//! Storage layer for clickstream analysis.
//!
//! Provides persistence for imported events and the two derived tables
//! (subsession records and role labels) using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared across
//! threads without external synchronization. The analysis itself runs on plain
//! vectors loaded from here, so only the CLI thread touches the connection.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in RFC 3339 format with nanosecond precision and a
//! `Z` suffix (e.g., `2024-01-15T10:30:00.000000000Z`). The fixed width keeps
//! lexicographic ordering equal to chronological ordering, and values read back exactly.
//!
//! ## Repeated Rows
//!
//! Every imported row is kept, including exact repeats: a repeated arrival is a
//! session boundary of its own. `seq` records import order.
//!
//! ## Missing URLs
//!
//! An event without a referrer is stored with an empty `referrer_url`. Link lists in `subsession_records` are JSON
//! arrays in which a missing referrer is `null`.

use std::path::Path;

use chrono::SecondsFormat;
use cs_core::{
    Event, MalformedEventError, PageUrl, RawEvent, RawTimestamp, RoleLabeledEvent, SessionId,
    SessionRole, SubsessionId, SubsessionRecord, UnknownSessionRole, UserId, ValidationError,
};
use rusqlite::{Connection, Row, Transaction, params};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored event no longer validates.
    #[error("invalid stored event: {0}")]
    MalformedEvent(#[from] MalformedEventError),
    /// A stored identifier is empty.
    #[error("invalid stored identifier: {0}")]
    InvalidId(#[from] ValidationError),
    /// A stored role label is not a known role.
    #[error(transparent)]
    UnknownRole(#[from] UnknownSessionRole),
    /// A JSON list column could not be encoded or decoded.
    #[error("invalid JSON column: {0}")]
    Json(#[from] serde_json::Error),
    /// Any other row that cannot be read back.
    #[error("invalid row in {table}: {message}")]
    InvalidRow { table: &'static str, message: String },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// Row counts shown by `cs status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableCounts {
    pub events: i64,
    pub users: i64,
    pub subsession_records: i64,
    pub role_labels: i64,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS events (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                event_timestamp TEXT NOT NULL,
                referrer_url TEXT NOT NULL DEFAULT '',
                target_url TEXT NOT NULL,
                platform TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_events_user_time ON events(user_id, event_timestamp);

            CREATE TABLE IF NOT EXISTS subsession_records (
                subsession_id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                user_id TEXT NOT NULL,
                duration_ms INTEGER NOT NULL,
                platforms_used TEXT NOT NULL,
                url_link_list TEXT NOT NULL,
                urlloc_link_list TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_subsession_records_user ON subsession_records(user_id);

            CREATE TABLE IF NOT EXISTS role_labels (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                event_timestamp TEXT NOT NULL,
                referrer_url TEXT NOT NULL DEFAULT '',
                target_url TEXT NOT NULL,
                platform TEXT NOT NULL DEFAULT '',
                prev_target_url TEXT,
                next_referrer_url TEXT,
                session_role TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_role_labels_role ON role_labels(session_role);
            ",
        )?;
        Ok(())
    }

    /// Appends a batch of events.
    ///
    /// Returns the number of rows inserted, which is always `events.len()`.
    pub fn insert_events(&mut self, events: &[Event]) -> Result<usize, DbError> {
        if events.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let inserted = insert_event_rows(&tx, events)?;
        tx.commit()?;
        Ok(inserted)
    }

    /// Replaces every stored event with `events`.
    pub fn replace_events(&mut self, events: &[Event]) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM events", [])?;
        let inserted = insert_event_rows(&tx, events)?;
        tx.commit()?;
        tracing::debug!(removed, inserted, "replaced events");
        Ok(inserted)
    }

    /// Lists all events ordered by user, then timestamp, then import order.
    pub fn list_events(&self) -> Result<Vec<Event>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT user_id, event_timestamp, referrer_url, target_url, platform
            FROM events
            ORDER BY user_id ASC, event_timestamp ASC, seq ASC
            ",
        )?;
        let rows = stmt.query_map([], raw_event_from_row)?;
        let mut events = Vec::new();
        for row in rows {
            events.push(row?.validate()?);
        }
        Ok(events)
    }

    /// Replaces the contents of `subsession_records`.
    pub fn replace_subsession_records(
        &mut self,
        records: &[SubsessionRecord],
    ) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM subsession_records", [])?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO subsession_records
                (subsession_id, session_id, user_id, duration_ms, platforms_used, url_link_list, urlloc_link_list)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
            )?;
            for record in records {
                stmt.execute(params![
                    record.subsession_id.as_str(),
                    record.session_id.as_str(),
                    record.user_id.as_str(),
                    record.duration_ms,
                    serde_json::to_string(&record.platforms_used)?,
                    serde_json::to_string(&record.url_link_list)?,
                    serde_json::to_string(&record.urlloc_link_list)?,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(count = records.len(), "stored subsession records");
        Ok(records.len())
    }

    /// Lists subsession records ordered by subsession ID.
    pub fn list_subsession_records(&self) -> Result<Vec<SubsessionRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT subsession_id, session_id, user_id, duration_ms, platforms_used, url_link_list, urlloc_link_list
            FROM subsession_records
            ORDER BY subsession_id ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (subsession_id, session_id, user_id, duration_ms, platforms, urls, netlocs) = row?;
            records.push(SubsessionRecord {
                subsession_id: SubsessionId::new(subsession_id)?,
                session_id: SessionId::new(session_id)?,
                user_id: UserId::new(user_id)?,
                duration_ms,
                platforms_used: serde_json::from_str(&platforms)?,
                url_link_list: serde_json::from_str(&urls)?,
                urlloc_link_list: serde_json::from_str(&netlocs)?,
            });
        }
        Ok(records)
    }

    /// Replaces the contents of `role_labels`, keeping the given order.
    pub fn replace_role_labels(&mut self, labels: &[RoleLabeledEvent]) -> Result<usize, DbError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM role_labels", [])?;
        {
            let mut stmt = tx.prepare(
                "
                INSERT INTO role_labels
                (user_id, event_timestamp, referrer_url, target_url, platform,
                 prev_target_url, next_referrer_url, session_role)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;
            for label in labels {
                let event = &label.event;
                stmt.execute(params![
                    event.user_id.as_str(),
                    format_timestamp(event),
                    event.referrer_url.as_ref().map_or("", PageUrl::as_str),
                    event.target_url.as_str(),
                    event.platform,
                    label.prev_target_url.as_ref().map(PageUrl::as_str),
                    label.next_referrer_url.as_ref().map(PageUrl::as_str),
                    label.session_role.map(|role| role.as_str()),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(count = labels.len(), "stored role labels");
        Ok(labels.len())
    }

    /// Lists role labels in the order they were stored.
    pub fn list_role_labels(&self) -> Result<Vec<RoleLabeledEvent>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT user_id, event_timestamp, referrer_url, target_url, platform,
                   prev_target_url, next_referrer_url, session_role
            FROM role_labels
            ORDER BY seq ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                raw_event_from_row(row)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, Option<String>>(7)?,
            ))
        })?;

        let mut labels = Vec::new();
        for row in rows {
            let (raw, prev_target, next_referrer, role) = row?;
            labels.push(RoleLabeledEvent {
                event: raw.validate()?,
                prev_target_url: parse_optional_url(prev_target)?,
                next_referrer_url: parse_optional_url(next_referrer)?,
                session_role: role.as_deref().map(str::parse::<SessionRole>).transpose()?,
            });
        }
        Ok(labels)
    }

    /// Counts rows in every table.
    pub fn table_counts(&self) -> Result<TableCounts, DbError> {
        let count = |sql: &str| self.conn.query_row(sql, [], |row| row.get::<_, i64>(0));
        Ok(TableCounts {
            events: count("SELECT COUNT(*) FROM events")?,
            users: count("SELECT COUNT(DISTINCT user_id) FROM events")?,
            subsession_records: count("SELECT COUNT(*) FROM subsession_records")?,
            role_labels: count("SELECT COUNT(*) FROM role_labels")?,
        })
    }
}

fn insert_event_rows(tx: &Transaction<'_>, events: &[Event]) -> Result<usize, DbError> {
    let mut stmt = tx.prepare(
        "
        INSERT INTO events
        (user_id, event_timestamp, referrer_url, target_url, platform)
        VALUES (?, ?, ?, ?, ?)
        ",
    )?;
    let mut inserted = 0;
    for event in events {
        inserted += stmt.execute(params![
            event.user_id.as_str(),
            format_timestamp(event),
            event.referrer_url.as_ref().map_or("", PageUrl::as_str),
            event.target_url.as_str(),
            event.platform,
        ])?;
    }
    Ok(inserted)
}

fn raw_event_from_row(row: &Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        user_id: row.get(0)?,
        event_timestamp: RawTimestamp::Text(row.get(1)?),
        referrer_url: row.get(2)?,
        target_url: row.get(3)?,
        platform: row.get(4)?,
    })
}

fn parse_optional_url(value: Option<String>) -> Result<Option<PageUrl>, DbError> {
    value
        .map(|raw| {
            PageUrl::parse(raw).map_err(|err| DbError::InvalidRow {
                table: "role_labels",
                message: err.to_string(),
            })
        })
        .transpose()
}

fn format_timestamp(event: &Event) -> String {
    event
        .event_timestamp
        .to_rfc3339_opts(SecondsFormat::Nanos, true)
}
