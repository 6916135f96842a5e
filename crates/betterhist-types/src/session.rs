use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Environment variable carrying the id of the enclosing session.
pub const SESSION_ENV: &str = "BETTERHIST_SESSION";

/// Environment variable carrying the path of the enclosing session's store.
pub const STORE_ENV: &str = "BETTERHIST_STORE";

/// Identity of one proxy session (and of its record store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// File name of this session's store inside the sessions directory.
    pub fn store_file_name(&self) -> String {
        format!("{}.db", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| Error::InvalidSessionId(s.to_string()))
    }
}

/// The session a nested invocation is running inside of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub id: SessionId,
    pub store_path: PathBuf,
}

impl ActiveSession {
    /// Marker variables to export into the child shell's environment.
    pub fn env_vars(&self) -> [(&'static str, String); 2] {
        [
            (SESSION_ENV, self.id.to_string()),
            (STORE_ENV, self.store_path.to_string_lossy().to_string()),
        ]
    }
}
