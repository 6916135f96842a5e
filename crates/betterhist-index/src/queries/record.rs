use betterhist_types::{NewRecord, Record, RecordId};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};

use crate::Result;

pub const RECORD_COLUMNS: &str =
    "id, command, output, timestamp, raw_length, columns, lines, discontinuity";

pub fn insert(conn: &Connection, record: &NewRecord) -> Result<RecordId> {
    conn.execute(
        r#"
        INSERT INTO records (command, output, timestamp, raw_length, columns, lines, discontinuity)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            &record.command,
            &record.output,
            record.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            i64::try_from(record.raw_length).unwrap_or(i64::MAX),
            record.columns,
            record.lines,
            record.discontinuity,
        ],
    )?;

    Ok(RecordId::new(conn.last_insert_rowid()))
}

pub fn get_by_id(conn: &Connection, id: RecordId) -> Result<Option<Record>> {
    let record = conn
        .query_row(
            &format!("SELECT {} FROM records WHERE id = ?1", RECORD_COLUMNS),
            [id.get()],
            from_row,
        )
        .optional()?;
    Ok(record)
}

/// `back` = 1 is the most recent record.
pub fn get_from_end(conn: &Connection, back: i64) -> Result<Option<Record>> {
    if back < 1 {
        return Ok(None);
    }

    let record = conn
        .query_row(
            &format!(
                "SELECT {} FROM records ORDER BY id DESC LIMIT 1 OFFSET ?1",
                RECORD_COLUMNS
            ),
            [back - 1],
            from_row,
        )
        .optional()?;
    Ok(record)
}

pub fn last_n(conn: &Connection, n: usize) -> Result<Vec<Record>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {cols} FROM (
            SELECT {cols} FROM records ORDER BY id DESC LIMIT ?1
        ) ORDER BY id ASC
        "#,
        cols = RECORD_COLUMNS
    ))?;

    let limit = i64::try_from(n).unwrap_or(i64::MAX);
    let records = stmt
        .query_map([limit], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records)
}

pub fn count(conn: &Connection) -> Result<u64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}

pub fn max_id(conn: &Connection) -> Result<Option<i64>> {
    Ok(conn.query_row("SELECT MAX(id) FROM records", [], |row| row.get(0))?)
}

pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Record> {
    let timestamp: String = row.get(3)?;
    let timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
    let raw_length: i64 = row.get(4)?;

    Ok(Record {
        id: RecordId::new(row.get(0)?),
        command: row.get(1)?,
        output: row.get(2)?,
        timestamp,
        raw_length: raw_length.max(0) as u64,
        columns: row.get(5)?,
        lines: row.get(6)?,
        discontinuity: row.get(7)?,
    })
}
