//! Persisted copies of the session record.
//!
//! A mirror keeps the session alive across restarts. Entries are keyed by
//! the fully resolved login URL, so sessions against different backends
//! never overwrite each other.
//!
//! - `FileMirror`: JSON file in the cache directory
//! - `MemoryMirror`: in-process map for tests and embedding

pub mod file;
pub mod memory;

use thiserror::Error;
use tracing::warn;

use crate::auth::SessionRecord;

pub use file::FileMirror;
pub use memory::MemoryMirror;

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Session storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session storage is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Session storage lock poisoned")]
    Poisoned,
}

/// Storage backend for persisted session records.
pub trait SessionMirror: Send + Sync {
    /// The record stored under `key`, if any
    fn read(&self, key: &str) -> Result<Option<SessionRecord>, MirrorError>;

    fn write(&self, key: &str, record: &SessionRecord) -> Result<(), MirrorError>;
}

/// Read `key`, treating a missing entry or an unreadable store as logged out.
pub fn load_or_default(mirror: &dyn SessionMirror, key: &str) -> SessionRecord {
    match mirror.read(key) {
        Ok(Some(record)) => record,
        Ok(None) => SessionRecord::default(),
        Err(e) => {
            warn!(key, error = %e, "Failed to read persisted session, starting logged out");
            SessionRecord::default()
        }
    }
}
