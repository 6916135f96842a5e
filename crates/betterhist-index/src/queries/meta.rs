use rusqlite::{Connection, OptionalExtension, params};

use crate::Result;

pub const SESSION_ID: &str = "session_id";
pub const SHELL: &str = "shell";
pub const STARTED_AT: &str = "started_at";
pub const ENDED_AT: &str = "ended_at";

/// Session-level facts recorded alongside the records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionMeta {
    pub session_id: Option<String>,
    pub shell: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
}

pub fn set(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO session_meta (key, value) VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
        params![key, value],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM session_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn load(conn: &Connection) -> Result<SessionMeta> {
    let mut stmt = conn.prepare("SELECT key, value FROM session_meta")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut meta = SessionMeta::default();
    for row in rows {
        let (key, value) = row?;
        match key.as_str() {
            SESSION_ID => meta.session_id = Some(value),
            SHELL => meta.shell = Some(value),
            STARTED_AT => meta.started_at = Some(value),
            ENDED_AT => meta.ended_at = Some(value),
            _ => {}
        }
    }
    Ok(meta)
}
