use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use super::{MirrorError, SessionMirror};
use crate::auth::SessionRecord;

/// Session file name in cache directory
const SESSION_FILE: &str = "session.json";

/// File-backed session mirror.
///
/// All records live in one pretty-printed JSON object, `session.json`,
/// mapping login URL to session record. Writes rewrite the whole file.
pub struct FileMirror {
    path: PathBuf,
    // serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileMirror {
    /// Mirror stored as `session.json` inside `cache_dir`
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self::at_path(cache_dir.into().join(SESSION_FILE))
    }

    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_all(&self) -> Result<BTreeMap<String, SessionRecord>, MirrorError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }
}

impl SessionMirror for FileMirror {
    fn read(&self, key: &str) -> Result<Option<SessionRecord>, MirrorError> {
        let _guard = self.lock.lock().map_err(|_| MirrorError::Poisoned)?;
        Ok(self.load_all()?.remove(key))
    }

    fn write(&self, key: &str, record: &SessionRecord) -> Result<(), MirrorError> {
        let _guard = self.lock.lock().map_err(|_| MirrorError::Poisoned)?;

        let mut records = self.load_all()?;
        records.insert(key.to_string(), record.clone());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&records)?;
        std::fs::write(&self.path, contents)?;

        debug!(path = ?self.path, key, logged_in = record.is_logged_in(), "Session persisted");
        Ok(())
    }
}
