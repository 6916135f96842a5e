use std::fmt;

/// Result type for betterhist-index operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur in the record store
#[derive(Debug)]
pub enum Error {
    /// Database operation failed
    Database(rusqlite::Error),

    /// IO operation failed
    Io(std::io::Error),

    /// No record with the requested id (or relative index)
    NotFound(i64),

    /// Store was written by an incompatible schema version
    SchemaMismatch { found: i32, expected: i32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Database(err) => {
                let msg = err.to_string();
                if msg.contains("no such column") || msg.contains("no such table") {
                    write!(
                        f,
                        "Database schema mismatch: {}. Start a new session to recreate the store.",
                        msg
                    )
                } else {
                    write!(f, "Database error: {}", err)
                }
            }
            Error::Io(err) => write!(f, "IO error: {}", err),
            Error::NotFound(id) => write!(f, "Record not found: {}", id),
            Error::SchemaMismatch { found, expected } => write!(
                f,
                "Database schema mismatch: store has version {}, expected {}. Start a new session to recreate the store.",
                found, expected
            ),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Database(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::NotFound(_) | Error::SchemaMismatch { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}
