//! Shared data types for the conversation session.
//!
//! These mirror §3 of the specification: `Utterance`, `Transcript`,
//! `AgentReply`, `ConversationState` and its auxiliary `SessionState`.

use serde::{Deserialize, Serialize};

/// The five-state conversation machine's tag. Mutated only by the session
/// manager in `voice-engine`; every other observer sees read-only snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    Listening,
    Processing,
    Speaking,
    WaitingForWakeword,
}

impl ConversationState {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Speaking => "speaking",
            Self::WaitingForWakeword => "waiting_for_wakeword",
        }
    }
}

/// Human-readable cause recorded on every transition, per §4.10.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransitionReason {
    Start,
    Transcript,
    ReplyOk,
    ReplyErr(String),
    EmptyTranscript,
    PlaybackComplete,
    BargeIn,
    Stop,
    Fatal(String),
}

impl TransitionReason {
    /// The event tag recorded on `VoiceEvent::StateChanged`; carried messages
    /// (on `ReplyErr`/`Fatal`) live in `last_error`/`VoiceEvent::Error`, not here.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Transcript => "transcript",
            Self::ReplyOk => "reply_ok",
            Self::ReplyErr(_) => "reply_err",
            Self::EmptyTranscript => "empty_transcript",
            Self::PlaybackComplete => "playback_complete",
            Self::BargeIn => "barge_in",
            Self::Stop => "stop",
            Self::Fatal(_) => "fatal",
        }
    }
}

/// Full auxiliary state that rides alongside the `ConversationState` tag.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub last_transcript: Option<String>,
    pub last_reply: Option<String>,
    pub last_error: Option<String>,
    pub agent_connected: bool,
    pub session_id: Option<String>,
    pub last_barge_in_at_ms: Option<u64>,
}

/// A captured speech segment, handed from C4 to C5.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub samples: Vec<i16>,
    pub duration_ms: u64,
}

impl Utterance {
    #[must_use]
    pub fn new(samples: Vec<i16>, sample_rate: u32) -> Self {
        let duration_ms = (samples.len() as u64 * 1000) / u64::from(sample_rate.max(1));
        Self {
            samples,
            duration_ms,
        }
    }
}

/// A non-empty transcript. The empty/garbage case is a distinct event
/// (`empty_transcript`), not a value of this type.
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub audio_duration_ms: u64,
    pub stt_duration_ms: u64,
}

/// The agent's reply to a single transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReply {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub latency_ms: u64,
}

/// A contiguous owned PCM buffer at the TTS sample rate.
#[derive(Debug, Clone)]
pub struct PlaybackChunk {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utterance_duration_from_sample_count() {
        let u = Utterance::new(vec![0i16; 16_000], 16_000);
        assert_eq!(u.duration_ms, 1_000);
    }

    #[test]
    fn conversation_state_labels() {
        assert_eq!(ConversationState::Idle.label(), "idle");
        assert_eq!(
            ConversationState::WaitingForWakeword.label(),
            "waiting_for_wakeword"
        );
    }
}
