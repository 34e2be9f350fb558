//! Default `VoiceEventSink`: prints each observable event to stdout.
//!
//! The console/TUI renderer named in spec.md §1's out-of-scope list is a
//! richer collaborator than this; this sink exists only so the binary has
//! somewhere to put events when no such renderer is wired in.

use voice_core::ports::VoiceEventSink;
use voice_core::VoiceEvent;

#[derive(Debug, Default)]
pub struct StdoutEventSink;

impl VoiceEventSink for StdoutEventSink {
    fn emit(&self, event: VoiceEvent) {
        match event {
            VoiceEvent::Started => println!("listening for speech..."),
            VoiceEvent::Stopped => println!("stopped."),
            VoiceEvent::StateChanged { from, to, reason } => {
                println!("[{} -> {}] ({reason})", from.label(), to.label());
            }
            VoiceEvent::Transcript { text, .. } => println!("you: {text}"),
            VoiceEvent::EmptyTranscript { reason } => println!("({reason})"),
            VoiceEvent::Response { text, .. } => println!("agent: {text}"),
            VoiceEvent::BargeIn { probability } => {
                println!("(barge-in, p={probability:.2})");
            }
            VoiceEvent::ConnectionChanged { connected } => {
                println!("agent {}", if connected { "reconnected" } else { "disconnected" });
            }
            VoiceEvent::SpeakingStarted => {}
            VoiceEvent::SpeakingComplete => {}
            VoiceEvent::SpeakingStopped => println!("(interrupted)"),
            VoiceEvent::Error { kind, message } => eprintln!("error [{kind}]: {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emit_does_not_panic_on_every_event_variant() {
        let sink = StdoutEventSink;
        sink.emit(VoiceEvent::Started);
        sink.emit(VoiceEvent::Error {
            kind: "stt_empty",
            message: "x".into(),
        });
        sink.emit(VoiceEvent::BargeIn { probability: 0.8 });
    }
}
