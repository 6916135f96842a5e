use std::fmt;

/// Result type for betterhist-types operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the types layer
#[derive(Debug)]
pub enum Error {
    /// A session identifier did not parse as a UUID
    InvalidSessionId(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidSessionId(raw) => write!(f, "Invalid session id: '{}'", raw),
        }
    }
}

impl std::error::Error for Error {}
