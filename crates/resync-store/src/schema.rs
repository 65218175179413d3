//! Database schema and migrations.
//!
//! The schema version lives in SQLite's `user_version` pragma; a fresh
//! database reports 0.

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

/// Bring the database up to [`SCHEMA_VERSION`].
pub fn initialize(conn: &Connection) -> Result<()> {
    let mut version = user_version(conn)?;

    while version < SCHEMA_VERSION {
        apply(conn, version + 1)?;
        version += 1;
        conn.pragma_update(None, "user_version", version)?;
        tracing::debug!("Store schema now at version {}", version);
    }

    Ok(())
}

fn user_version(conn: &Connection) -> Result<i32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get(0))?)
}

fn apply(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => conn.execute_batch(
            r#"
            -- Flat key/value namespace; values are JSON documents
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?,
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(user_version(&conn).unwrap(), 0);
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
        assert_eq!(user_version(&conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_creates_kv_table() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='kv'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }
}
