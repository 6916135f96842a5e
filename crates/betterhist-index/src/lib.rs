// Per-session record store
// One SQLite file per session, records are append-only

mod db;
mod error;
mod queries;
mod schema;

// Public API
pub use db::Database;
pub use error::{Error, Result};
pub use queries::meta::SessionMeta;
pub use queries::search::{SearchIter, SearchScope};
pub use schema::SCHEMA_VERSION;
