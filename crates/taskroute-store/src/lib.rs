//! TaskRoute Store — SQLite persistence for the routing audit trail.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
