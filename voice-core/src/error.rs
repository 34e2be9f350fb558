//! Core error taxonomy.
//!
//! Every variant here corresponds to exactly one row of the error-kind table:
//! component-local errors convert into this type at the point they cross
//! back into the session manager, so no error kind can be swallowed without
//! also producing a `VoiceEvent::Error`.

use std::path::PathBuf;
use thiserror::Error;

/// Canonical error kind for the whole engine.
///
/// `Fatal` variants are only ever raised during startup or on unrecoverable
/// device loss; `Recoverable` variants always return the session to
/// `listening` rather than propagating further.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No input device is available or it was disconnected.
    #[error("microphone unavailable: {0}")]
    MicUnavailable(String),

    /// No output device is available or it was disconnected.
    #[error("speaker unavailable: {0}")]
    SpeakerUnavailable(String),

    /// The audio backend reports PulseAudio is not running.
    #[error("pulseaudio is not running")]
    PulseaudioNotRunning,

    /// The VAD classifier model failed to load.
    #[error("VAD model error: {0}")]
    VadModelError(String),

    /// The STT out-of-process binary could not be located.
    #[error("whisper binary not found at {0}")]
    SttBinaryNotFound(PathBuf),

    /// The TTS out-of-process binary could not be located.
    #[error("piper binary not found at {0}")]
    TtsBinaryNotFound(PathBuf),

    /// Transcript was empty after trimming.
    #[error("empty transcript")]
    SttEmpty,

    /// Transcript matched the known no-speech garbage set.
    #[error("garbage transcript: {0:?}")]
    SttGarbage(String),

    /// The STT subprocess exited non-zero or produced unparsable output.
    #[error("STT process error: {0}")]
    SttProcessError(String),

    /// Synthesis failed for a sentence.
    #[error("TTS synthesis failed: {0}")]
    TtsFailed(String),

    /// The TTS subprocess exited non-zero or produced unparsable output.
    #[error("TTS process error: {0}")]
    TtsProcessError(String),

    /// The agent gateway could not be reached at all.
    #[error("agent unreachable: {0}")]
    AgentUnreachable(String),

    /// The connection monitor observed a transition into disconnected.
    #[error("connection lost")]
    ConnectionLost,

    /// The agent did not reply within the configured deadline.
    #[error("agent request timed out after {0:?}")]
    GatewayTimeout(std::time::Duration),

    /// An attempted state transition was not in the allowed set.
    #[error("invalid state transition from {from:?} on {event}")]
    StateTransitionError { from: String, event: String },

    /// Engine configuration failed validation.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// Required configuration or a model asset is missing.
    #[error("missing configuration or asset: {0}")]
    ConfigMissing(String),

    /// I/O failure not otherwise classified.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Whether this error is fatal for the whole process (§7's "Fatal" rows)
    /// rather than recoverable back to `listening`.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MicUnavailable(_)
                | Self::SpeakerUnavailable(_)
                | Self::PulseaudioNotRunning
                | Self::VadModelError(_)
                | Self::SttBinaryNotFound(_)
                | Self::TtsBinaryNotFound(_)
                | Self::ConfigInvalid(_)
                | Self::ConfigMissing(_)
        )
    }

    /// The short machine-readable kind tag carried on `VoiceEvent::Error`.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MicUnavailable(_) => "mic_unavailable",
            Self::SpeakerUnavailable(_) => "speaker_unavailable",
            Self::PulseaudioNotRunning => "pulseaudio_not_running",
            Self::VadModelError(_) => "vad_model_error",
            Self::SttBinaryNotFound(_) => "whisper_not_found",
            Self::TtsBinaryNotFound(_) => "piper_not_found",
            Self::SttEmpty => "stt_empty",
            Self::SttGarbage(_) => "stt_garbage",
            Self::SttProcessError(_) => "stt_process_error",
            Self::TtsFailed(_) => "tts_failed",
            Self::TtsProcessError(_) => "tts_process_error",
            Self::AgentUnreachable(_) => "openclaw_unreachable",
            Self::ConnectionLost => "connection_lost",
            Self::GatewayTimeout(_) => "gateway_timeout",
            Self::StateTransitionError { .. } => "state_transition_error",
            Self::ConfigInvalid(_) => "config_invalid",
            Self::ConfigMissing(_) => "config_missing",
            Self::Io(_) => "io_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_classification_matches_taxonomy() {
        assert!(CoreError::MicUnavailable("x".into()).is_fatal());
        assert!(CoreError::ConfigMissing("x".into()).is_fatal());
        assert!(!CoreError::SttEmpty.is_fatal());
        assert!(!CoreError::AgentUnreachable("x".into()).is_fatal());
    }

    #[test]
    fn kind_tags_are_stable() {
        assert_eq!(CoreError::SttEmpty.kind(), "stt_empty");
        assert_eq!(CoreError::ConnectionLost.kind(), "connection_lost");
        assert_eq!(
            CoreError::AgentUnreachable("down".into()).kind(),
            "openclaw_unreachable"
        );
    }
}
