//! Default `SessionPersistencePort` implementation: a flat JSON file under
//! the platform data directory.
//!
//! This exists purely so the binary is runnable end to end. Per SPEC_FULL
//! §6, atomicity and backup guarantees belong to whichever collaborator
//! owns the on-disk format in a fuller deployment; this implementation does
//! a plain write-then-rename, which is enough to avoid leaving a
//! half-written file behind on a crash mid-save.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use voice_core::ports::{SessionPersistenceError, SessionPersistencePort};

#[derive(Debug, Serialize, Deserialize, Default)]
struct StoredSession {
    session_id: Option<String>,
}

pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("session.json"),
        }
    }
}

#[async_trait]
impl SessionPersistencePort for FileSessionStore {
    async fn load_session_id(&self) -> Result<Option<String>, SessionPersistenceError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            if !path.exists() {
                return Ok(None);
            }
            let contents = std::fs::read_to_string(&path).map_err(|e| SessionPersistenceError::Load(e.to_string()))?;
            let stored: StoredSession =
                serde_json::from_str(&contents).map_err(|e| SessionPersistenceError::Load(e.to_string()))?;
            Ok(stored.session_id)
        })
        .await
        .map_err(|e| SessionPersistenceError::Load(e.to_string()))?
    }

    async fn save_session_id(&self, id: Option<&str>) -> Result<(), SessionPersistenceError> {
        let path = self.path.clone();
        let stored = StoredSession {
            session_id: id.map(str::to_string),
        };
        tokio::task::spawn_blocking(move || {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| SessionPersistenceError::Save(e.to_string()))?;
            }
            let json = serde_json::to_string_pretty(&stored).map_err(|e| SessionPersistenceError::Save(e.to_string()))?;
            let tmp_path = path.with_extension("json.tmp");
            std::fs::write(&tmp_path, json).map_err(|e| SessionPersistenceError::Save(e.to_string()))?;
            std::fs::rename(&tmp_path, &path).map_err(|e| SessionPersistenceError::Save(e.to_string()))?;
            debug!(path = %path.display(), "session id persisted");
            Ok(())
        })
        .await
        .map_err(|e| SessionPersistenceError::Save(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_a_saved_session_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSessionStore::new(dir.path());

        assert_eq!(store.load_session_id().await.unwrap(), None);

        store.save_session_id(Some("abc")).await.unwrap();
        assert_eq!(store.load_session_id().await.unwrap(), Some("abc".to_string()));

        store.save_session_id(None).await.unwrap();
        assert_eq!(store.load_session_id().await.unwrap(), None);
    }

    #[tokio::test]
    async fn creates_parent_directories_on_first_save() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("state");
        let store = FileSessionStore::new(&nested);

        store.save_session_id(Some("abc")).await.unwrap();
        assert_eq!(store.load_session_id().await.unwrap(), Some("abc".to_string()));
    }
}
