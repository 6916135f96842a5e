pub mod error;
pub mod record;
pub mod session;

pub use error::{Error, Result};
pub use record::{NewRecord, Record, RecordId};
pub use session::{ActiveSession, SESSION_ENV, STORE_ENV, SessionId};
