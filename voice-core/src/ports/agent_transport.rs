//! Agent transport port (C8's collaborator boundary).
//!
//! Implementations reach the agent gateway over localhost HTTP. This trait
//! exists so C8's retry-free, no-fabrication contract can be tested against
//! a fake transport without a real socket.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::AgentReply;

/// Errors an agent transport may surface. These map directly onto the
/// `openclaw_unreachable` / `connection_lost` / `gateway_timeout` error kinds.
#[derive(Debug, Error, Clone)]
pub enum AgentTransportError {
    #[error("agent unreachable: {0}")]
    Unreachable(String),

    #[error("agent request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("agent endpoint rejected: {0}")]
    Rejected(String),
}

/// Sends transcripts to the agent gateway and returns its reply.
///
/// # Design Rules
///
/// - MUST reject any endpoint that does not resolve to localhost.
/// - MUST NOT retry internally; a single failed attempt is a single failure.
/// - MUST NOT fabricate a reply on failure.
#[async_trait]
pub trait AgentTransportPort: Send + Sync {
    /// Send a transcript, optionally continuing a prior session.
    async fn send(
        &self,
        text: &str,
        session_id: Option<&str>,
    ) -> Result<AgentReply, AgentTransportError>;

    /// Cheap reachability probe used by the connection monitor (C9).
    async fn health_check(&self) -> bool;
}
