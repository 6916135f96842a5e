//! Invocation context: whether this process runs inside a recorded session.
//!
//! The environment is read once at startup and turned into an explicit
//! [`SessionContext`]; everything downstream takes the context as a value.

use std::path::{Path, PathBuf};

use betterhist_runtime::config::store_path;
use betterhist_types::{ActiveSession, SESSION_ENV, STORE_ENV, SessionId};

use crate::args::Commands;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub session: Option<ActiveSession>,
}

impl SessionContext {
    /// Build the context from `(key, value)` environment pairs.
    ///
    /// Without an explicit store path the store is looked up under
    /// `<data_dir>/sessions/`.
    pub fn from_env<I, K, V>(vars: I, data_dir: &Path) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut session_id = None;
        let mut store = None;

        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                SESSION_ENV if !value.is_empty() => session_id = Some(value.to_string()),
                STORE_ENV if !value.is_empty() => store = Some(PathBuf::from(value)),
                _ => {}
            }
        }

        let Some(raw_id) = session_id else {
            return Self::default();
        };

        let id: SessionId = match raw_id.parse() {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("ignoring session marker: {}", e);
                return Self::default();
            }
        };

        let store_path = store.unwrap_or_else(|| store_path(data_dir, &id));
        Self {
            session: Some(ActiveSession { id, store_path }),
        }
    }

    pub fn in_session(&self) -> bool {
        self.session.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Not inside a session: spawn a recorded shell.
    StartSession,
    /// Inside a session with no subcommand: print the latest turn.
    RenderLatest,
    Query(Commands),
}

pub fn detect_mode(context: &SessionContext, command: Option<Commands>) -> Mode {
    match command {
        Some(command) => Mode::Query(command),
        None if context.in_session() => Mode::RenderLatest,
        None => Mode::StartSession,
    }
}
