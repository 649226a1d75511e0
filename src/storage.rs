//! Local persistence for the customer database, the active round, and the archive.
//!
//! Storage is a plain key-value port: each record is one JSON document under a
//! fixed key. The default backend is a single `SQLite` file:
//!
//! ```text
//! <data-dir>/
//!   plow.sqlite      # kv(key, value): customerDatabase, activeRound, completedRounds
//! ```

mod memory;
mod sqlite;

use std::{io, path::PathBuf};

#[cfg(test)]
pub(crate) use memory::FlakyStore;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Key of the customer registry: a JSON array of customers.
pub const CUSTOMER_DATABASE: &str = "customerDatabase";

/// Key of the in-progress round: a JSON round, or `null`.
pub const ACTIVE_ROUND: &str = "activeRound";

/// Key of the archive: a JSON array of ended rounds, most recent first.
pub const COMPLETED_ROUNDS: &str = "completedRounds";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt record: {0}")]
    Corrupt(String),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// Synchronous get/set by string key.
///
/// Implementations must be safe to share: the state cells hold the store
/// behind an `Arc`.
pub trait KeyValueStore: Send + Sync {
    /// Returns the value stored under `key`, or `None` if it was never set.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Returns the default data directory: `~/.plow/`.
pub fn default_root() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".plow"))
}
