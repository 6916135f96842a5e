use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use betterhist_engine::{Segmenter, SegmenterStats, TapEvent, Turn};
use betterhist_index::Database;
use betterhist_types::SessionId;
use chrono::Utc;

use crate::terminal::TerminalSize;
use crate::{Error, Result};

/// Consecutive store failures after which recording is given up.
const MAX_APPEND_FAILURES: u32 = 5;

const MIN_IDLE_CHECK: Duration = Duration::from_millis(10);

/// Terminal size as last seen by the supervisor; stamped onto each record.
pub type SharedSize = Arc<Mutex<TerminalSize>>;

#[derive(Debug, Default)]
pub struct RecorderSummary {
    pub turns_recorded: u64,
    pub stats: SegmenterStats,
    /// Set when recording was abandoned after repeated store errors.
    pub error: Option<Error>,
}

/// Consumes tap events, segments them into turns, and appends each finished
/// turn to the session's record store.
pub struct Recorder {
    segmenter: Segmenter,
    db: Database,
    idle: Duration,
    session: Option<(SessionId, String)>,
    turns_recorded: u64,
    failures: u32,
}

impl Recorder {
    pub fn new(segmenter: Segmenter, db: Database, idle: Duration) -> Self {
        Self {
            segmenter,
            db,
            idle: idle.max(MIN_IDLE_CHECK),
            session: None,
            turns_recorded: 0,
            failures: 0,
        }
    }

    /// Session identity written to the store's metadata when recording starts.
    pub fn with_session(mut self, id: SessionId, shell: impl Into<String>) -> Self {
        self.session = Some((id, shell.into()));
        self
    }

    pub fn spawn(
        self,
        rx: Receiver<TapEvent>,
        size: SharedSize,
    ) -> std::io::Result<JoinHandle<RecorderSummary>> {
        std::thread::Builder::new()
            .name("betterhist-recorder".to_string())
            .spawn(move || self.run(rx, size))
    }

    /// Process events until `End` arrives or every sender is gone.
    pub fn run(mut self, rx: Receiver<TapEvent>, size: SharedSize) -> RecorderSummary {
        if let Some((id, shell)) = &self.session
            && let Err(e) = self
                .db
                .record_session_start(&id.to_string(), shell, Utc::now())
        {
            tracing::error!("failed to write session metadata: {}", e);
        }

        let mut idle_sent = false;
        let mut error = None;

        loop {
            let event = match rx.recv_timeout(self.idle) {
                Ok(event) => event,
                Err(RecvTimeoutError::Timeout) => {
                    if idle_sent {
                        continue;
                    }
                    idle_sent = true;
                    TapEvent::Idle
                }
                Err(RecvTimeoutError::Disconnected) => TapEvent::End,
            };

            if !matches!(event, TapEvent::Idle) {
                idle_sent = false;
            }
            let end = matches!(event, TapEvent::End);

            for turn in self.segmenter.feed(event) {
                if let Err(e) = self.store(turn, &size) {
                    error = Some(e);
                    break;
                }
            }
            if error.is_some() {
                tracing::error!(
                    "giving up on recording after {} failed writes",
                    MAX_APPEND_FAILURES
                );
                break;
            }
            if end {
                break;
            }
        }

        if error.is_none() {
            if let Some(turn) = self.segmenter.finish()
                && let Err(e) = self.store(turn, &size)
            {
                error = Some(e);
            }
            if let Err(e) = self.db.record_session_end(Utc::now()) {
                tracing::error!("failed to write session end: {}", e);
            }
        }

        let summary = RecorderSummary {
            turns_recorded: self.turns_recorded,
            stats: self.segmenter.stats(),
            error,
        };
        tracing::info!(
            turns = summary.turns_recorded,
            discarded = summary.stats.turns_discarded,
            gaps = summary.stats.gaps,
            "recorder finished"
        );
        summary
    }

    /// Fails once the store has rejected `MAX_APPEND_FAILURES` turns in a row.
    fn store(&mut self, turn: Turn, size: &SharedSize) -> Result<()> {
        let turn = match size.lock() {
            Ok(size) => turn.with_terminal_size(size.columns, size.lines),
            Err(_) => turn,
        };

        match self.db.append(&turn) {
            Ok(id) => {
                tracing::debug!(id = id.get(), command = %turn.command, "recorded turn");
                self.turns_recorded += 1;
                self.failures = 0;
                Ok(())
            }
            Err(e) => {
                self.failures += 1;
                let err = Error::Recording(format!("turn `{}` not stored: {}", turn.command, e));
                tracing::error!("{}", err);
                if self.failures < MAX_APPEND_FAILURES {
                    Ok(())
                } else {
                    Err(err)
                }
            }
        }
    }
}
