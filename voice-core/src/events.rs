//! The single polymorphic event sink, per §9's design note preferring one
//! tagged event variant over per-event callbacks so state-change ordering
//! stays auditable.

use serde::{Deserialize, Serialize};

use crate::model::ConversationState;

/// Every event an external observer (UI collaborator, tests) may receive.
/// This is the realization of §6's "Observable events" list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceEvent {
    Started,
    Stopped,

    StateChanged {
        from: ConversationState,
        to: ConversationState,
        reason: String,
    },

    Transcript {
        text: String,
        audio_duration_ms: u64,
        stt_duration_ms: u64,
    },

    EmptyTranscript {
        reason: String,
    },

    Response {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        duration_ms: u64,
    },

    BargeIn {
        probability: f32,
    },

    ConnectionChanged {
        connected: bool,
    },

    SpeakingStarted,
    SpeakingComplete,
    SpeakingStopped,

    Error {
        kind: &'static str,
        message: String,
    },
}
