use std::fmt;

/// Result type for betterhist-runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the session proxy
#[derive(Debug)]
pub enum Error {
    /// No pseudo-terminal could be obtained
    PtyAllocation(String),

    /// The shell could not be started on the pty
    Fork(String),

    /// Raw mode could not be entered or the original mode restored
    TerminalMode(String),

    /// Fatal I/O error while proxying
    Io(std::io::Error),

    /// Recording failed; the session itself keeps running
    Recording(String),

    /// Record store error
    Index(betterhist_index::Error),

    /// Configuration error
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PtyAllocation(msg) => write!(f, "Failed to allocate a pty: {}", msg),
            Error::Fork(msg) => write!(f, "Failed to start shell: {}", msg),
            Error::TerminalMode(msg) => write!(f, "Terminal mode error: {}", msg),
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::Recording(msg) => write!(f, "Recording error: {}", msg),
            Error::Index(err) => write!(f, "Index error: {}", err),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Index(err) => Some(err),
            Error::PtyAllocation(_)
            | Error::Fork(_)
            | Error::TerminalMode(_)
            | Error::Recording(_)
            | Error::Config(_) => None,
        }
    }
}

impl From<betterhist_index::Error> for Error {
    fn from(err: betterhist_index::Error) -> Self {
        Error::Index(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
