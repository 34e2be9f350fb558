//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// voicebridge: a local-first, conversational voice front-end for an
/// agent gateway reachable over localhost HTTP.
#[derive(Parser)]
#[command(name = "voicebridge")]
#[command(about = "Local-first voice front-end: mic -> VAD -> STT -> agent -> TTS -> speaker")]
#[command(version)]
pub struct Cli {
    /// Path to the VAD classifier model. Omit to use the built-in energy
    /// heuristic.
    #[arg(long, global = true)]
    pub vad_model: Option<PathBuf>,

    /// Path to the whisper.cpp-compatible STT binary.
    #[arg(long, global = true, env = "VOICEBRIDGE_STT_BINARY")]
    pub stt_binary: Option<PathBuf>,

    /// Path to the STT model file.
    #[arg(long, global = true, env = "VOICEBRIDGE_STT_MODEL")]
    pub stt_model: Option<PathBuf>,

    /// Path to the piper-compatible TTS binary.
    #[arg(long, global = true, env = "VOICEBRIDGE_TTS_BINARY")]
    pub tts_binary: Option<PathBuf>,

    /// Path to the TTS voice model file.
    #[arg(long, global = true, env = "VOICEBRIDGE_TTS_MODEL")]
    pub tts_model: Option<PathBuf>,

    /// Agent gateway endpoint. Must resolve to localhost.
    #[arg(long, global = true, default_value = "http://127.0.0.1:8765/chat")]
    pub agent_endpoint: String,

    /// Disable barge-in (the agent can no longer be interrupted mid-reply).
    #[arg(long, global = true)]
    pub no_barge_in: bool,

    /// Override the directory session state (the persisted session id) is
    /// kept in. Defaults to the platform data directory.
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the conversation loop (default when no subcommand is given).
    Run,

    /// Check that every configured model asset exists without starting
    /// the conversation loop.
    CheckAssets,

    /// Forget the persisted session id so the next turn starts a fresh
    /// agent conversation.
    ResetSession,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_localhost_agent_endpoint() {
        let cli = Cli::parse_from(["voicebridge"]);
        assert_eq!(cli.agent_endpoint, "http://127.0.0.1:8765/chat");
        assert!(!cli.no_barge_in);
    }

    #[test]
    fn parses_check_assets_subcommand() {
        let cli = Cli::parse_from(["voicebridge", "check-assets"]);
        assert!(matches!(cli.command, Some(Commands::CheckAssets)));
    }
}
