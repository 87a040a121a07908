use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{MirrorError, SessionMirror};
use crate::auth::SessionRecord;

/// In-memory session mirror.
///
/// Records are lost when the process exits. Clones share the same map,
/// which lets a test keep a handle while the controller owns another.
#[derive(Clone, Default)]
pub struct MemoryMirror {
    records: Arc<RwLock<HashMap<String, SessionRecord>>>,
}

impl MemoryMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the mirror with `record` under `key`
    pub fn with_record(key: &str, record: SessionRecord) -> Self {
        let mirror = Self::new();
        if let Ok(mut guard) = mirror.records.write() {
            guard.insert(key.to_string(), record);
        }
        mirror
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionMirror for MemoryMirror {
    fn read(&self, key: &str) -> Result<Option<SessionRecord>, MirrorError> {
        let guard = self.records.read().map_err(|_| MirrorError::Poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn write(&self, key: &str, record: &SessionRecord) -> Result<(), MirrorError> {
        let mut guard = self.records.write().map_err(|_| MirrorError::Poisoned)?;
        guard.insert(key.to_string(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let mirror = MemoryMirror::new();
        assert!(mirror.is_empty());

        let record = SessionRecord {
            token: "T".to_string(),
            ..Default::default()
        };
        mirror.write("https://host/user/auth", &record).unwrap();

        assert_eq!(mirror.read("https://host/user/auth").unwrap(), Some(record));
        assert_eq!(mirror.read("https://other/user/auth").unwrap(), None);
        assert_eq!(mirror.len(), 1);
    }

    #[test]
    fn test_clones_share_records() {
        let mirror = MemoryMirror::with_record("k", SessionRecord::default());
        let handle = mirror.clone();
        handle
            .write(
                "k",
                &SessionRecord {
                    token: "T".to_string(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(mirror.read("k").unwrap().unwrap().token, "T");
    }
}
