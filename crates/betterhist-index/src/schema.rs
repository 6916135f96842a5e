use rusqlite::Connection;

use crate::{Error, Result};

// Schema version (increment when changing table definitions)
pub const SCHEMA_VERSION: i32 = 1;

// NOTE: records are written once and never updated. AUTOINCREMENT keeps ids
// from being reused even if the tail of the table is ever removed by hand.

pub fn init_schema(conn: &Connection) -> Result<()> {
    let current_version = user_version(conn)?;

    if current_version != SCHEMA_VERSION {
        if current_version != 0 {
            tracing::warn!(
                found = current_version,
                expected = SCHEMA_VERSION,
                "record store schema changed, recreating tables"
            );
        }
        drop_all_tables(conn)?;
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            command TEXT NOT NULL,
            output TEXT NOT NULL,
            timestamp TEXT NOT NULL,
            raw_length INTEGER NOT NULL,
            columns INTEGER,
            lines INTEGER,
            discontinuity INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS session_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute(&format!("PRAGMA user_version = {}", SCHEMA_VERSION), [])?;

    Ok(())
}

/// Read-only connections cannot migrate; they only verify.
pub fn check_schema(conn: &Connection) -> Result<()> {
    let found = user_version(conn)?;
    if found != SCHEMA_VERSION {
        return Err(Error::SchemaMismatch {
            found,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(())
}

fn user_version(conn: &Connection) -> Result<i32> {
    Ok(conn.query_row("PRAGMA user_version", [], |row| row.get(0))?)
}

fn drop_all_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        DROP TABLE IF EXISTS records;
        DROP TABLE IF EXISTS session_meta;
        "#,
    )?;
    Ok(())
}
