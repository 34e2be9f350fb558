//! The observer-facing half of the single polymorphic sink pattern (§9).

use crate::events::VoiceEvent;

/// Trait for emitting conversation events to whatever is listening.
///
/// Implementations handle transport details (an mpsc channel, an IPC bridge,
/// a test collector) and must not block the caller.
pub trait VoiceEventSink: Send + Sync {
    /// Emit an event. Must not block; implementations that need to fan out
    /// should buffer or drop rather than stall the session manager.
    fn emit(&self, event: VoiceEvent);
}

/// A sink that discards every event, for tests and headless use.
#[derive(Debug, Clone, Default)]
pub struct NoopEventSink;

impl VoiceEventSink for NoopEventSink {
    fn emit(&self, _event: VoiceEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_sink_accepts_every_event_without_panicking() {
        let sink = NoopEventSink;
        sink.emit(VoiceEvent::Started);
        sink.emit(VoiceEvent::Error {
            kind: "stt_empty",
            message: "x".into(),
        });
    }
}
