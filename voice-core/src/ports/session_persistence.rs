//! Session id persistence port (§6's external persistence collaborator).
//!
//! Atomicity and backup behaviour are the implementation's concern; the
//! engine only needs to load a prior id at startup and save a new one when
//! the agent returns one.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum SessionPersistenceError {
    #[error("failed to load session id: {0}")]
    Load(String),

    #[error("failed to save session id: {0}")]
    Save(String),
}

#[async_trait]
pub trait SessionPersistencePort: Send + Sync {
    /// Returns the previously persisted session id, if any.
    async fn load_session_id(&self) -> Result<Option<String>, SessionPersistenceError>;

    /// Persists (or clears, when `None`) the current session id.
    async fn save_session_id(&self, id: Option<&str>) -> Result<(), SessionPersistenceError>;
}
