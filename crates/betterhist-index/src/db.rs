use betterhist_types::{NewRecord, Record, RecordId};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::queries::search::{SearchIter, SearchScope};
use crate::queries::{meta, record};
use crate::schema;
use crate::{Error, Result};

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Handle on one session's record store.
///
/// A session owns the only read-write handle; query invocations use
/// [`Database::open_read_only`] and see a committed prefix of the records.
pub struct Database {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Database {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        schema::init_schema(&conn)?;

        tracing::debug!(path = %db_path.display(), journal_mode, "opened record store");

        Ok(Self {
            conn,
            path: Some(db_path.to_path_buf()),
        })
    }

    pub fn open_read_only(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no record store at {}", db_path.display()),
            )));
        }

        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        schema::check_schema(&conn)?;

        Ok(Self {
            conn,
            path: Some(db_path.to_path_buf()),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    // Record operations

    /// Persist a finalized turn and return its id.
    ///
    /// The insert is a single statement, so a crash leaves either the whole
    /// record or nothing visible to readers.
    pub fn append(&self, record: &NewRecord) -> Result<RecordId> {
        record::insert(&self.conn, record)
    }

    pub fn get(&self, id: RecordId) -> Result<Record> {
        record::get_by_id(&self.conn, id)?.ok_or(Error::NotFound(id.get()))
    }

    /// Positive values are ids; negative values count back from the most
    /// recent record (`-1` is the latest).
    pub fn get_relative(&self, index: i64) -> Result<Record> {
        if index >= 0 {
            return self.get(RecordId::new(index));
        }

        let back = index.checked_neg().ok_or(Error::NotFound(index))?;
        record::get_from_end(&self.conn, back)?.ok_or(Error::NotFound(index))
    }

    /// Matches `query` case-insensitively against the text `scope` selects.
    ///
    /// Each call starts a fresh iteration; with no appends in between, two
    /// calls yield the same records in the same order.
    pub fn search(&self, query: &str, scope: SearchScope) -> Result<SearchIter<'_>> {
        let max_id = record::max_id(&self.conn)?;
        Ok(SearchIter::new(&self.conn, query, scope, max_id))
    }

    /// The `n` most recent records, ascending by id.
    pub fn last_n(&self, n: usize) -> Result<Vec<Record>> {
        record::last_n(&self.conn, n)
    }

    pub fn latest(&self) -> Result<Option<Record>> {
        record::get_from_end(&self.conn, 1)
    }

    pub fn count(&self) -> Result<u64> {
        record::count(&self.conn)
    }

    // Session metadata

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        meta::set(&self.conn, key, value)
    }

    pub fn meta(&self, key: &str) -> Result<Option<String>> {
        meta::get(&self.conn, key)
    }

    pub fn session_meta(&self) -> Result<meta::SessionMeta> {
        meta::load(&self.conn)
    }

    pub fn record_session_start(
        &self,
        session_id: &str,
        shell: &str,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        meta::set(&self.conn, meta::SESSION_ID, session_id)?;
        meta::set(&self.conn, meta::SHELL, shell)?;
        meta::set(
            &self.conn,
            meta::STARTED_AT,
            &started_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }

    pub fn record_session_end(&self, ended_at: DateTime<Utc>) -> Result<()> {
        meta::set(
            &self.conn,
            meta::ENDED_AT,
            &ended_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(commands: &[(&str, &str)]) -> Database {
        let db = Database::open_in_memory().unwrap();
        for (command, output) in commands {
            db.append(&NewRecord::new(*command, *output)).unwrap();
        }
        db
    }

    #[test]
    fn test_append_assigns_consecutive_ids() {
        let db = Database::open_in_memory().unwrap();

        let ids: Vec<i64> = (0..5)
            .map(|i| db.append(&NewRecord::new(format!("echo {}", i), i.to_string())))
            .map(|id| id.unwrap().get())
            .collect();

        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(db.count().unwrap(), 5);
    }

    #[test]
    fn test_get_returns_stored_fields() {
        let db = Database::open_in_memory().unwrap();
        let mut new = NewRecord::new("ls -la", "total 0\n\x1b[34mdir\x1b[0m").with_terminal_size(120, 40);
        new.raw_length = 4096;
        new.discontinuity = true;

        let id = db.append(&new).unwrap();
        let record = db.get(id).unwrap();

        assert_eq!(record.command, "ls -la");
        assert_eq!(record.output, "total 0\n\x1b[34mdir\x1b[0m");
        assert_eq!(record.raw_length, 4096);
        assert_eq!(record.columns, Some(120));
        assert_eq!(record.lines, Some(40));
        assert!(record.discontinuity);
        assert_eq!(
            record.timestamp.timestamp_millis(),
            new.timestamp.timestamp_millis()
        );
    }

    #[test]
    fn test_get_missing_id_is_not_found() {
        let db = seeded(&[("pwd", "/")]);

        match db.get(RecordId::new(42)) {
            Err(Error::NotFound(42)) => {}
            other => panic!("expected NotFound(42), got {:?}", other),
        }
    }

    #[test]
    fn test_get_relative_counts_back_from_latest() {
        let db = seeded(&[("one", ""), ("two", ""), ("three", "")]);

        assert_eq!(db.get_relative(-1).unwrap().command, "three");
        assert_eq!(db.get_relative(-3).unwrap().command, "one");
        assert_eq!(db.get_relative(2).unwrap().command, "two");
        assert!(matches!(db.get_relative(-4), Err(Error::NotFound(-4))));
        assert!(matches!(db.get_relative(0), Err(Error::NotFound(0))));
        assert!(matches!(
            db.get_relative(i64::MIN),
            Err(Error::NotFound(i64::MIN))
        ));
    }

    #[test]
    fn test_search_is_most_recent_first_and_case_insensitive() {
        let db = seeded(&[
            ("which code", "/usr/bin/code"),
            ("ls", "Cargo.toml"),
            ("which cursor", "/usr/local/bin/cursor"),
            ("bh search which", "   2 | which code | /usr/bin/code"),
        ]);

        let commands: Vec<String> = db
            .search("WHICH", SearchScope::Both)
            .unwrap()
            .map(|r| r.unwrap().command)
            .collect();

        assert_eq!(commands, vec!["bh search which", "which cursor", "which code"]);
    }

    #[test]
    fn test_search_matches_output_and_non_ascii() {
        let db = seeded(&[("cat notes", "Ärger im Büro"), ("echo hi", "hi")]);

        let hits: Vec<_> = db
            .search("ärger", SearchScope::Both)
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect();

        assert_eq!(hits, vec![RecordId::new(1)]);
    }

    #[test]
    fn test_search_ignores_color_sequences_in_output() {
        let db = seeded(&[
            ("cargo build", "\x1b[1;31merror\x1b[0m: mismatched types"),
            ("ls --color", "\x1b[31mred.txt\x1b[0m"),
        ]);

        let hits: Vec<_> = db
            .search("error:", SearchScope::Both)
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect();
        assert_eq!(hits, vec![RecordId::new(1)]);

        assert_eq!(db.search("31m", SearchScope::Both).unwrap().count(), 0);
    }

    #[test]
    fn test_search_scope_selects_command_or_output() {
        let db = seeded(&[
            ("which code", "/usr/bin/code"),
            ("cat notes", "remember: which one"),
            ("ls", "Cargo.toml"),
        ]);
        let ids = |scope| -> Vec<i64> {
            db.search("which", scope)
                .unwrap()
                .map(|r| r.unwrap().id.get())
                .collect()
        };

        assert_eq!(ids(SearchScope::Command), vec![1]);
        assert_eq!(ids(SearchScope::Output), vec![2]);
        assert_eq!(ids(SearchScope::Both), vec![2, 1]);
    }

    #[test]
    fn test_search_is_repeatable() {
        let db = seeded(&[("git status", "clean"), ("git log", "abc"), ("make", "ok")]);

        let run = || -> Vec<Record> {
            db.search("git", SearchScope::Both)
                .unwrap()
                .map(|r| r.unwrap())
                .collect()
        };
        let first = run();
        let second = run();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
    }

    #[test]
    fn test_search_does_not_see_records_appended_mid_iteration() {
        let db = seeded(&[("a", ""), ("b", "")]);

        let mut iter = db.search("", SearchScope::Both).unwrap();
        let first = iter.next().unwrap().unwrap();
        db.append(&NewRecord::new("c", "")).unwrap();
        let rest: Vec<_> = iter.map(|r| r.unwrap().command).collect();

        assert_eq!(first.command, "b");
        assert_eq!(rest, vec!["a"]);
    }

    #[test]
    fn test_search_pages_through_large_store() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..600 {
            let command = if i % 100 == 0 { "needle" } else { "hay" };
            db.append(&NewRecord::new(command, i.to_string())).unwrap();
        }

        let ids: Vec<i64> = db
            .search("needle", SearchScope::Both)
            .unwrap()
            .map(|r| r.unwrap().id.get())
            .collect();

        assert_eq!(ids, vec![501, 401, 301, 201, 101, 1]);
    }

    #[test]
    fn test_search_on_empty_store_yields_nothing() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.search("anything", SearchScope::Both).unwrap().count(), 0);
    }

    #[test]
    fn test_last_n_is_ascending() {
        let db = seeded(&[("1", ""), ("2", ""), ("3", ""), ("4", "")]);

        let commands: Vec<_> = db.last_n(2).unwrap().into_iter().map(|r| r.command).collect();
        assert_eq!(commands, vec!["3", "4"]);

        assert_eq!(db.last_n(10).unwrap().len(), 4);
        assert!(db.last_n(0).unwrap().is_empty());
    }

    #[test]
    fn test_latest() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.latest().unwrap().is_none());

        db.append(&NewRecord::new("conda activate bh", "")).unwrap();
        assert_eq!(db.latest().unwrap().unwrap().command, "conda activate bh");
    }

    #[test]
    fn test_session_meta() {
        let db = Database::open_in_memory().unwrap();
        let started = Utc::now();

        db.record_session_start("abc", "/bin/zsh", started).unwrap();
        db.set_meta("shell", "/bin/bash").unwrap();

        let meta = db.session_meta().unwrap();
        assert_eq!(meta.session_id.as_deref(), Some("abc"));
        assert_eq!(meta.shell.as_deref(), Some("/bin/bash"));
        assert!(meta.started_at.is_some());
        assert!(meta.ended_at.is_none());
        assert_eq!(db.meta("missing").unwrap(), None);
    }
}
