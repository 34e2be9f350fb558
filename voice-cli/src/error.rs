//! CLI-facing error wrapping and the kind -> user-visible message mapping
//! from spec.md §7. The engine only hands back a `CoreError` kind and
//! message; turning that into a short, concrete suggestion is this
//! collaborator's job, not the engine's.

use voice_core::CoreError;

/// Wraps a `CoreError` with the human-facing suggestion text §7 calls for.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct CliError {
    pub message: String,
    pub suggestion: Option<&'static str>,
}

impl CliError {
    /// Exit codes per spec.md §6: 0 on clean shutdown, 1 on initialization
    /// failure or unrecoverable runtime error. There is only one non-zero
    /// exit code in this system; the distinction between init and runtime
    /// failure is carried in the message, not the code.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        1
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let suggestion = suggestion_for(&err);
        Self {
            message: err.to_string(),
            suggestion,
        }
    }
}

/// One short, concrete suggestion per error kind, per §7's "accompanied by
/// one or more suggestions" requirement. Kinds with no actionable next step
/// (bugs, malformed agent replies) carry no suggestion.
fn suggestion_for(err: &CoreError) -> Option<&'static str> {
    match err {
        CoreError::MicUnavailable(_) => Some("Check that a microphone is connected and not in use by another application."),
        CoreError::SpeakerUnavailable(_) => Some("Check that a speaker or headset is connected and selected as the default output."),
        CoreError::PulseaudioNotRunning => Some("Start PulseAudio with `pulseaudio --start`."),
        CoreError::VadModelError(_) => Some("Verify the --vad-model path points at a readable model file, or omit it to use the built-in heuristic."),
        CoreError::SttBinaryNotFound(_) => Some("Install whisper.cpp and pass its path with --stt-binary."),
        CoreError::TtsBinaryNotFound(_) => Some("Install piper and pass its path with --tts-binary."),
        CoreError::ConfigInvalid(_) | CoreError::ConfigMissing(_) => Some("Check the command-line flags and environment variables against `voicebridge --help`."),
        CoreError::AgentUnreachable(_) | CoreError::ConnectionLost => Some("Check that the agent gateway is running and reachable on localhost."),
        CoreError::GatewayTimeout(_) => Some("The agent gateway is slow to respond; check its health or raise the deadline."),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_fatal_kind_carries_a_suggestion() {
        let fatal_examples = [
            CoreError::MicUnavailable("x".into()),
            CoreError::SpeakerUnavailable("x".into()),
            CoreError::PulseaudioNotRunning,
            CoreError::VadModelError("x".into()),
            CoreError::SttBinaryNotFound("x".into()),
            CoreError::ConfigInvalid("x".into()),
            CoreError::ConfigMissing("x".into()),
        ];
        for err in fatal_examples {
            assert!(err.is_fatal());
            let cli_err: CliError = err.into();
            assert!(cli_err.suggestion.is_some());
        }
    }

    #[test]
    fn exit_code_is_always_one() {
        let err: CliError = CoreError::SttEmpty.into();
        assert_eq!(err.exit_code(), 1);
    }
}
