//! Key/value persistence for session state.
//!
//! The SDK never touches ambient global state: whatever holds the tokens is
//! handed to the client as a [`PersistentStore`]. Two stores ship with the
//! crate:
//! - [`MemoryStore`]: lives as long as the process
//! - [`SqliteStore`]: file-backed, survives restarts (used by the CLI)

mod memory;
mod sqlite;

use anyhow::Result;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Minimal key/value contract the token store is built on
pub trait PersistentStore: Send + Sync {
    /// Value stored under `key`, `None` if absent
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Insert or overwrite `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing an absent key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}
