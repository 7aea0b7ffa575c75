use anyhow::{Context, Result};
use rusqlite::Connection;

/// Current schema version, stamped into `PRAGMA user_version`.
pub(crate) const SCHEMA_VERSION: i64 = 1;

const SQL_CREATE_NOTE: &str = "
    CREATE TABLE IF NOT EXISTS note (
        _id INTEGER PRIMARY KEY,
        title TEXT UNIQUE,
        content TEXT,
        importance INTEGER
    );
";

const SQL_DROP_NOTE: &str = "DROP TABLE IF EXISTS note;";

/// Brings the database up to the current schema. A stored version above
/// `SCHEMA_VERSION` is a downgrade: the table is dropped and recreated
/// empty, losing its rows.
pub fn apply(conn: &Connection) -> Result<()> {
    let stored: i64 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .context("reading schema version")?;

    if stored > SCHEMA_VERSION {
        tracing::warn!(
            stored,
            expected = SCHEMA_VERSION,
            "schema version from the future, dropping note table"
        );
        conn.execute_batch(SQL_DROP_NOTE)
            .context("dropping note table on downgrade")?;
    }

    conn.execute_batch(SQL_CREATE_NOTE)
        .context("creating note table")?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .context("stamping schema version")?;
    Ok(())
}
