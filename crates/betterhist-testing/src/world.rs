//! TestWorld pattern for CLI integration tests.
//!
//! Sets up an isolated data directory, optionally an enclosing session with a
//! seeded record store, and configures CLI commands to run inside it.

use anyhow::Result;
use assert_cmd::Command;
use betterhist_index::Database;
use betterhist_types::{ActiveSession, NewRecord, RecordId, SESSION_ENV, STORE_ENV, SessionId};
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Declarative test environment builder.
///
/// # Example
/// ```no_run
/// use betterhist_testing::TestWorld;
///
/// let world = TestWorld::new()
///     .with_session()
///     .with_records(&[("ls", "Cargo.toml")]);
/// ```
pub struct TestWorld {
    temp_dir: TempDir,
    data_dir: PathBuf,
    session: Option<ActiveSession>,
    env_vars: HashMap<String, String>,
}

impl Default for TestWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl TestWorld {
    /// Create a new isolated test environment with no enclosing session.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_dir = temp_dir.path().join(".betterhist");
        std::fs::create_dir_all(&data_dir).expect("Failed to create data dir");

        Self {
            temp_dir,
            data_dir,
            session: None,
            env_vars: HashMap::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn session(&self) -> Option<&ActiveSession> {
        self.session.as_ref()
    }

    /// Pretend commands run inside a session whose store already exists.
    pub fn with_session(mut self) -> Self {
        let id = SessionId::generate();
        let store_path = self
            .data_dir
            .join("sessions")
            .join(id.store_file_name());

        let db = Database::open(&store_path).expect("Failed to create session store");
        db.record_session_start(&id.to_string(), "/bin/bash", Utc::now())
            .expect("Failed to write session metadata");

        self.session = Some(ActiveSession { id, store_path });
        self
    }

    /// Append `(command, output)` turns to the session store.
    pub fn with_records(self, records: &[(&str, &str)]) -> Self {
        for (command, output) in records {
            self.append(NewRecord::new(*command, *output))
                .expect("Failed to seed record");
        }
        self
    }

    pub fn append(&self, record: NewRecord) -> Result<RecordId> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("TestWorld has no session; call with_session()"))?;
        let db = Database::open(&session.store_path)?;
        Ok(db.append(&record)?)
    }

    /// Set an environment variable for CLI execution.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Configure a CLI command with this test environment's settings.
    ///
    /// Marker variables inherited from a real enclosing session are removed so
    /// results do not depend on where the tests run.
    pub fn configure_command<'a>(&self, cmd: &'a mut Command) -> &'a mut Command {
        cmd.arg("--data-dir").arg(self.data_dir());
        cmd.current_dir(self.temp_dir.path());

        cmd.env_remove(SESSION_ENV)
            .env_remove(STORE_ENV)
            .env_remove("BETTERHIST_PATH")
            .env_remove("BETTERHIST_LOG");

        if let Some(session) = &self.session {
            for (key, value) in session.env_vars() {
                cmd.env(key, value);
            }
        }

        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        cmd
    }
}
