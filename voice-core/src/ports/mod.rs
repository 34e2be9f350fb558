//! Port definitions (trait abstractions) for external collaborators.
//!
//! Ports define the interfaces the engine expects from infrastructure and
//! from the hosting program. They contain no implementation details.
//!
//! # Design Rules
//!
//! - No `reqwest`/`cpal`/filesystem types in any signature.
//! - Traits are minimal and intent-based, not implementation-leaking.

pub mod agent_transport;
pub mod event_sink;
pub mod session_persistence;

pub use agent_transport::{AgentTransportError, AgentTransportPort};
pub use event_sink::VoiceEventSink;
pub use session_persistence::{SessionPersistenceError, SessionPersistencePort};
