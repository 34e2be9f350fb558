//! Domain types and port traits shared by the voicebridge conversation engine.
//!
//! This crate contains no I/O. It defines the vocabulary adapters in
//! `voice-engine` and `voice-cli` agree on: the conversation state machine's
//! data, the event enum observers subscribe to, and the port traits that
//! keep the agent transport and session persistence swappable.

#![deny(unsafe_code)]

pub mod error;
pub mod events;
pub mod model;
pub mod ports;

pub use error::CoreError;
pub use events::VoiceEvent;
pub use model::{
    AgentReply, ConversationState, PlaybackChunk, SessionState, Transcript, TransitionReason,
    Utterance,
};
pub use ports::{AgentTransportPort, SessionPersistencePort, VoiceEventSink};
