use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequential identifier of a finalized record, unique within one session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// One completed command/output turn as stored.
///
/// Records are immutable once appended; the store never rewrites them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Command line as captured from the echoed input.
    pub command: String,
    /// Output between the command echo and the next prompt (possibly capped).
    pub output: String,
    /// Time the turn was finalized.
    pub timestamp: DateTime<Utc>,
    /// Byte length of the captured output before any cap was applied.
    pub raw_length: u64,
    /// Terminal width at finalization, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub columns: Option<u16>,
    /// Terminal height at finalization, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lines: Option<u16>,
    /// Set when recording dropped bytes while this turn was open.
    #[serde(default, skip_serializing_if = "is_false")]
    pub discontinuity: bool,
}

impl Record {
    /// True when the stored output is shorter than what the shell produced.
    pub fn is_truncated(&self) -> bool {
        self.raw_length > self.output.len() as u64
    }

    /// Bytes of output that were not stored.
    pub fn elided_bytes(&self) -> u64 {
        self.raw_length.saturating_sub(self.output.len() as u64)
    }
}

/// A finalized turn that has not been assigned an id yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub command: String,
    pub output: String,
    pub timestamp: DateTime<Utc>,
    pub raw_length: u64,
    pub columns: Option<u16>,
    pub lines: Option<u16>,
    pub discontinuity: bool,
}

impl NewRecord {
    /// Turn with the given command and output, finalized now.
    pub fn new(command: impl Into<String>, output: impl Into<String>) -> Self {
        let output = output.into();
        Self {
            command: command.into(),
            raw_length: output.len() as u64,
            output,
            timestamp: Utc::now(),
            columns: None,
            lines: None,
            discontinuity: false,
        }
    }

    pub fn with_terminal_size(mut self, columns: u16, lines: u16) -> Self {
        self.columns = Some(columns);
        self.lines = Some(lines);
        self
    }

    pub fn into_record(self, id: RecordId) -> Record {
        Record {
            id,
            command: self.command,
            output: self.output,
            timestamp: self.timestamp,
            raw_length: self.raw_length,
            columns: self.columns,
            lines: self.lines,
            discontinuity: self.discontinuity,
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}
