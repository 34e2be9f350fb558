//! Composition root for the voicebridge binary.
//!
//! Parses CLI args, resolves model asset paths, wires `voice-engine` to
//! stdio/tracing, and maps the session manager's lifecycle to the exit
//! codes in spec.md §6. `main.rs` is kept to argument parsing and process
//! exit; everything else lives here so it can be exercised in tests.

#![deny(unsafe_code)]

pub mod bootstrap;
pub mod error;
pub mod event_sink;
pub mod parser;
pub mod session_store;

pub use bootstrap::{build_session_manager, resolve_config, ResolvedConfig};
pub use error::CliError;
pub use parser::{Cli, Commands};
