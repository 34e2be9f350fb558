//! voicebridge: a local-first conversational voice front-end.
//!
//! Composition root only — argument parsing and process exit. Everything
//! else (config resolution, adapter wiring) lives in the `voice_cli`
//! library so it can be unit tested without a real microphone or speaker.

use clap::Parser;
use tracing::{error, info};
use voice_cli::{build_session_manager, resolve_config, Cli, Commands};
use voice_engine::config::ModelPaths;
use voice_engine::SessionCommand;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let exit_code = run(cli).await;
    std::process::exit(exit_code);
}

async fn run(cli: Cli) -> i32 {
    let command = cli.command.as_ref().unwrap_or(&Commands::Run);

    let resolved = match resolve_config(&cli) {
        Ok(r) => r,
        Err(e) => {
            let cli_err = voice_cli::CliError::from(e);
            report_fatal(&cli_err);
            return cli_err.exit_code();
        }
    };

    match command {
        Commands::CheckAssets => check_assets(&resolved.model_paths),
        Commands::ResetSession => reset_session(&resolved.state_dir).await,
        Commands::Run => run_conversation(resolved).await,
    }
}

fn check_assets(paths: &ModelPaths) -> i32 {
    match paths.check() {
        Ok(()) => {
            println!("all configured model assets are present.");
            0
        }
        Err(e) => {
            let cli_err = voice_cli::CliError::from(e);
            report_fatal(&cli_err);
            1
        }
    }
}

async fn reset_session(state_dir: &std::path::Path) -> i32 {
    use voice_core::ports::SessionPersistencePort;
    let store = voice_cli::session_store::FileSessionStore::new(state_dir);
    match store.save_session_id(None).await {
        Ok(()) => {
            println!("session id cleared.");
            0
        }
        Err(e) => {
            eprintln!("error: failed to clear session id: {e}");
            1
        }
    }
}

async fn run_conversation(resolved: voice_cli::ResolvedConfig) -> i32 {
    if let Err(e) = resolved.model_paths.check() {
        let cli_err = voice_cli::CliError::from(e);
        report_fatal(&cli_err);
        return cli_err.exit_code();
    }

    let manager = match build_session_manager(&resolved) {
        Ok(m) => m,
        Err(e) => {
            let cli_err = voice_cli::CliError::from(e);
            report_fatal(&cli_err);
            return cli_err.exit_code();
        }
    };

    let (command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel();

    let stop_tx = command_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = stop_tx.send(SessionCommand::Stop);
        }
    });

    match manager.run(command_rx).await {
        Ok(()) => 0,
        Err(e) => {
            let cli_err = voice_cli::CliError::from(e);
            report_fatal(&cli_err);
            1
        }
    }
}

fn report_fatal(err: &voice_cli::CliError) {
    error!("{}", err.message);
    eprintln!("error: {}", err.message);
    if let Some(suggestion) = err.suggestion {
        eprintln!("  {suggestion}");
    }
}
