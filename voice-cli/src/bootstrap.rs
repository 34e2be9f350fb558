//! CLI bootstrap - the composition root.
//!
//! This is the only place concrete adapters (the HTTP agent transport, the
//! file-backed session store, the stdout event sink) are wired together.
//! Everything downstream only sees the `voice-core` port traits.

use std::path::PathBuf;
use std::sync::Arc;

use voice_core::ports::{AgentTransportPort, SessionPersistencePort, VoiceEventSink};
use voice_core::CoreError;
use voice_engine::agent_client::HttpAgentTransport;
use voice_engine::config::{
    AgentConfig, AudioConfig, EngineConfig, JitterBufferConfig, ModelPaths, SessionConfig,
    SttConfig, TtsConfig, VadConfig,
};
use voice_engine::SessionManager;

use crate::event_sink::StdoutEventSink;
use crate::parser::Cli;
use crate::session_store::FileSessionStore;

/// Resolved configuration the CLI needs before it can construct a
/// `SessionManager`: every field `Cli` does not set has a concrete default.
pub struct ResolvedConfig {
    pub engine: EngineConfig,
    pub model_paths: ModelPaths,
    pub state_dir: PathBuf,
}

/// Resolve CLI flags/environment into the engine's configuration surface.
/// Does not touch the filesystem beyond path resolution; asset existence is
/// checked separately by the caller via `ModelPaths::check`.
pub fn resolve_config(cli: &Cli) -> Result<ResolvedConfig, CoreError> {
    let state_dir = cli
        .state_dir
        .clone()
        .or_else(|| dirs::data_local_dir().map(|d| d.join("voicebridge")))
        .ok_or_else(|| CoreError::ConfigMissing("could not determine a state directory; pass --state-dir".into()))?;

    let stt_binary = cli
        .stt_binary
        .clone()
        .ok_or_else(|| CoreError::ConfigMissing("--stt-binary is required".into()))?;
    let stt_model = cli
        .stt_model
        .clone()
        .ok_or_else(|| CoreError::ConfigMissing("--stt-model is required".into()))?;
    let tts_binary = cli
        .tts_binary
        .clone()
        .ok_or_else(|| CoreError::ConfigMissing("--tts-binary is required".into()))?;
    let tts_model = cli
        .tts_model
        .clone()
        .ok_or_else(|| CoreError::ConfigMissing("--tts-model is required".into()))?;

    let model_paths = ModelPaths {
        vad: cli.vad_model.clone(),
        stt_binary: stt_binary.clone(),
        stt_model: stt_model.clone(),
        tts_binary: tts_binary.clone(),
        tts_model: tts_model.clone(),
    };

    let vad = VadConfig {
        model_path: cli.vad_model.clone(),
        ..VadConfig::default()
    };

    let engine = EngineConfig {
        audio: AudioConfig::default(),
        vad,
        stt: SttConfig {
            binary_path: stt_binary,
            model_path: stt_model,
            num_threads: std::thread::available_parallelism().map(|n| n.get() as u32).unwrap_or(4),
        },
        tts: TtsConfig {
            binary_path: tts_binary,
            model_path: tts_model,
            min_chunk_chars: 20,
        },
        jitter: JitterBufferConfig::default(),
        agent: AgentConfig {
            endpoint: cli.agent_endpoint.clone(),
            ..AgentConfig::default()
        },
        session: SessionConfig {
            barge_in_enabled: !cli.no_barge_in,
            ..SessionConfig::default()
        },
    };

    engine.validate()?;

    Ok(ResolvedConfig {
        engine,
        model_paths,
        state_dir,
    })
}

/// Construct a fully wired `SessionManager`. Callers must have already
/// checked `ModelPaths::check()` — construction fails the same way on
/// missing assets regardless, since C5/C6 re-verify independently.
pub fn build_session_manager(resolved: &ResolvedConfig) -> Result<SessionManager, CoreError> {
    let agent: Arc<dyn AgentTransportPort> = Arc::new(
        HttpAgentTransport::new(&resolved.engine.agent)
            .map_err(|e| CoreError::ConfigInvalid(e.to_string()))?,
    );
    let session_store: Arc<dyn SessionPersistencePort> = Arc::new(FileSessionStore::new(&resolved.state_dir));
    let sink: Arc<dyn VoiceEventSink> = Arc::new(StdoutEventSink);

    SessionManager::new(resolved.engine.clone(), agent, session_store, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn base_cli() -> Cli {
        Cli::parse_from([
            "voicebridge",
            "--stt-binary",
            "/bin/true",
            "--stt-model",
            "/tmp/model.bin",
            "--tts-binary",
            "/bin/true",
            "--tts-model",
            "/tmp/voice.onnx",
        ])
    }

    #[test]
    fn resolves_barge_in_enabled_by_default() {
        let resolved = resolve_config(&base_cli()).unwrap();
        assert!(resolved.engine.session.barge_in_enabled);
    }

    #[test]
    fn no_barge_in_flag_disables_it() {
        let mut cli = base_cli();
        cli.no_barge_in = true;
        let resolved = resolve_config(&cli).unwrap();
        assert!(!resolved.engine.session.barge_in_enabled);
    }

    #[test]
    fn missing_stt_binary_is_a_config_error() {
        let cli = Cli::parse_from(["voicebridge"]);
        assert!(matches!(resolve_config(&cli), Err(CoreError::ConfigMissing(_))));
    }
}
