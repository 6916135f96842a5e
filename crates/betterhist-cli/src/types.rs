use betterhist_index::SearchScope;
use clap::ValueEnum;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Plain => write!(f, "plain"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Text a search looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum SearchIn {
    Command,
    Output,
    Both,
}

impl fmt::Display for SearchIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchIn::Command => write!(f, "command"),
            SearchIn::Output => write!(f, "output"),
            SearchIn::Both => write!(f, "both"),
        }
    }
}

impl From<SearchIn> for SearchScope {
    fn from(value: SearchIn) -> Self {
        match value {
            SearchIn::Command => SearchScope::Command,
            SearchIn::Output => SearchScope::Output,
            SearchIn::Both => SearchScope::Both,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

/// Process exit codes.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const FAILURE: i32 = 1;
    pub const PTY_ALLOCATION: i32 = 2;
    pub const FORK: i32 = 3;
    pub const TERMINAL_MODE: i32 = 4;
    pub const NOT_FOUND: i32 = 5;
    pub const PROXY_IO: i32 = 6;
    pub const INTERRUPTED: i32 = 130;
}
