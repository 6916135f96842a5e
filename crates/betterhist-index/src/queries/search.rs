use std::collections::VecDeque;

use betterhist_engine::strip_ansi;
use betterhist_types::Record;
use rusqlite::{Connection, params};

use super::record::{RECORD_COLUMNS, from_row};
use crate::Result;

const PAGE_SIZE: i64 = 256;

/// Which text of a record a search looks at.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Command,
    Output,
    #[default]
    Both,
}

impl SearchScope {
    fn matches(self, record: &Record, needle: &str) -> bool {
        let in_command = || record.command.to_lowercase().contains(needle);
        // Stored output keeps its colors; match on what the user saw.
        let in_output = || strip_ansi(&record.output).to_lowercase().contains(needle);

        match self {
            SearchScope::Command => in_command(),
            SearchScope::Output => in_output(),
            SearchScope::Both => in_command() || in_output(),
        }
    }
}

/// Lazy, most-recent-first search over a snapshot of the store.
///
/// The upper id bound is fixed when the iterator is created, so records
/// appended while iterating are not visited. Matching is a Unicode
/// case-insensitive substring test on the command, the output without escape
/// sequences, or both.
pub struct SearchIter<'conn> {
    conn: &'conn Connection,
    needle: String,
    scope: SearchScope,
    upper: i64,
    buffer: VecDeque<Record>,
    done: bool,
}

impl<'conn> SearchIter<'conn> {
    pub(crate) fn new(
        conn: &'conn Connection,
        query: &str,
        scope: SearchScope,
        max_id: Option<i64>,
    ) -> Self {
        Self {
            conn,
            needle: query.to_lowercase(),
            scope,
            upper: max_id.map_or(0, |id| id + 1),
            buffer: VecDeque::new(),
            done: max_id.is_none(),
        }
    }

    fn fill(&mut self) -> Result<()> {
        let conn = self.conn;
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM records WHERE id < ?1 ORDER BY id DESC LIMIT ?2",
            RECORD_COLUMNS
        ))?;

        let mut scanned = 0;
        for row in stmt.query_map(params![self.upper, PAGE_SIZE], from_row)? {
            let record = row?;
            scanned += 1;
            self.upper = record.id.get();
            if self.scope.matches(&record, &self.needle) {
                self.buffer.push_back(record);
            }
        }

        if scanned < PAGE_SIZE {
            self.done = true;
        }
        Ok(())
    }
}

impl Iterator for SearchIter<'_> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }
            if let Err(err) = self.fill() {
                self.done = true;
                return Some(Err(err));
            }
        }
    }
}
