//! Session Manager (C12).
//!
//! The five-state conversation machine: `idle`, `listening`, `processing`,
//! `speaking`, `waiting_for_wakeword`. Exclusively owns the Speech Pipeline
//! (C10) and Playback Pipeline (C11) and holds the Agent Client (C8) and
//! Connection Monitor (C9) as shared collaborators. Every transition is
//! driven by exactly one event arriving on the session's own reactor loop —
//! there is no other place state is mutated.
//!
//! The transition table and its policy (barge-in cooldown, agent failure
//! handling, session continuity) live in the private [`Fsm`], kept free of
//! any pipeline/hardware dependency so it can be exercised directly in
//! tests. `SessionManager` wraps it with the owned pipelines and performs
//! the audio/network side effects `Fsm` asks for.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

use voice_core::ports::{AgentTransportError, AgentTransportPort, SessionPersistencePort, VoiceEventSink};
use voice_core::{AgentReply, ConversationState, CoreError, SessionState, Transcript, TransitionReason, VoiceEvent};

use crate::audio_thread::AudioThreadHandle;
use crate::config::EngineConfig;
use crate::connection_monitor::ConnectionMonitor;
use crate::playback_pipeline::{PlaybackPipeline, PlaybackPipelineEvent};
use crate::speech_pipeline::{SpeechEvent, SpeechPipeline};
use crate::stt::SttEngine;
use crate::tts::TtsEngine;

/// External control surface. `run()` consumes the `SessionManager`, so
/// callers (voice-cli's signal handler, tests) talk to it through a command
/// channel instead of holding a reference.
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Stop,
    ResetSession,
}

/// The allowed (from, reason) -> to transitions from §4.10, generalized to
/// this architecture's split between C10 (which already resolves STT
/// internally) and the agent round-trip C12 itself drives. `empty_transcript`
/// is folded into `listening -> listening` rather than routing through
/// `processing`, since STT runs inside the speech pipeline before C12 ever
/// sees the utterance; a recoverable error encountered while `speaking`
/// (e.g. a TTS failure) returns to `listening` the same way a `reply_err`
/// does, rather than introducing a separate reason.
fn allowed_next(from: ConversationState, reason: &TransitionReason) -> Option<ConversationState> {
    use ConversationState::{Idle, Listening, Processing, Speaking};
    use TransitionReason::{BargeIn, EmptyTranscript, Fatal, PlaybackComplete, ReplyErr, ReplyOk, Start, Stop, Transcript as TranscriptReason};

    match (from, reason) {
        (Idle, Start) => Some(Listening),
        (Listening, TranscriptReason) => Some(Processing),
        (Listening, EmptyTranscript) => Some(Listening),
        (Processing, ReplyOk) => Some(Speaking),
        (Processing, ReplyErr(_)) => Some(Listening),
        (Speaking, ReplyErr(_)) => Some(Listening),
        (Speaking, PlaybackComplete) => Some(Listening),
        (Speaking, BargeIn) => Some(Listening),
        (_, Stop) => Some(Idle),
        (_, Fatal(_)) => Some(Idle),
        _ => None,
    }
}

/// A pipeline-level side effect the `Fsm` asks its caller to perform. Kept
/// deliberately small: the `Fsm` decides *whether* speaking should start or
/// stop, `SessionManager` decides *how*.
enum Effect {
    None,
    StartSpeaking(String),
    StopPlayback,
}

/// The pure conversation state machine: no audio, no network, no STT/TTS.
/// Everything it needs from the outside world is behind the two ports
/// (`AgentTransportPort`, `SessionPersistencePort`) plus the event sink.
struct Fsm {
    agent: Arc<dyn AgentTransportPort>,
    session_store: Arc<dyn SessionPersistencePort>,
    sink: Arc<dyn VoiceEventSink>,

    barge_in_enabled: bool,
    barge_in_cooldown: Duration,
    agent_deadline: Duration,

    state: ConversationState,
    aux: SessionState,
    barge_in_cooldown_until: Option<Instant>,

    agent_reply_tx: mpsc::UnboundedSender<Result<AgentReply, AgentTransportError>>,
}

impl Fsm {
    fn state(&self) -> ConversationState {
        self.state
    }

    fn aux(&self) -> &SessionState {
        &self.aux
    }

    fn transition(&mut self, reason: TransitionReason) -> Result<(), CoreError> {
        let from = self.state;
        match allowed_next(from, &reason) {
            Some(to) => {
                self.sink.emit(VoiceEvent::StateChanged {
                    from,
                    to,
                    reason: reason.label().to_string(),
                });
                self.state = to;
                Ok(())
            }
            None => {
                let event = reason.label().to_string();
                let err = CoreError::StateTransitionError {
                    from: from.label().to_string(),
                    event: event.clone(),
                };
                error!(from = from.label(), event = %event, "invalid state transition attempted");
                self.sink.emit(VoiceEvent::Error {
                    kind: err.kind(),
                    message: err.to_string(),
                });
                self.state = ConversationState::Idle;
                Err(err)
            }
        }
    }

    fn on_start(&mut self) -> Result<(), CoreError> {
        self.transition(TransitionReason::Start)?;
        self.sink.emit(VoiceEvent::Started);
        Ok(())
    }

    fn on_stop(&mut self) {
        if self.state != ConversationState::Idle {
            let _ = self.transition(TransitionReason::Stop);
        }
        self.sink.emit(VoiceEvent::Stopped);
    }

    fn on_transcript(&mut self, transcript: Transcript) {
        if self.state != ConversationState::Listening {
            debug!(
                text = %transcript.text,
                state = ?self.state,
                "discarding transcript received outside listening"
            );
            return;
        }
        if self.transition(TransitionReason::Transcript).is_err() {
            return;
        }

        self.aux.last_transcript = Some(transcript.text.clone());
        self.sink.emit(VoiceEvent::Transcript {
            text: transcript.text.clone(),
            audio_duration_ms: transcript.audio_duration_ms,
            stt_duration_ms: transcript.stt_duration_ms,
        });

        let agent = self.agent.clone();
        let session_id = self.aux.session_id.clone();
        let deadline = self.agent_deadline;
        let reply_tx = self.agent_reply_tx.clone();
        let text = transcript.text;

        tokio::spawn(async move {
            let result = match tokio::time::timeout(deadline, agent.send(&text, session_id.as_deref())).await {
                Ok(result) => result,
                Err(_) => Err(AgentTransportError::Timeout(deadline)),
            };
            let _ = reply_tx.send(result);
        });
    }

    fn on_empty_transcript(&mut self, reason: String) {
        if self.state != ConversationState::Listening {
            debug!(state = ?self.state, "discarding empty transcript received outside listening");
            return;
        }
        if self.transition(TransitionReason::EmptyTranscript).is_err() {
            return;
        }
        self.aux.last_error = Some(reason.clone());
        self.sink.emit(VoiceEvent::EmptyTranscript { reason });
    }

    fn on_agent_reply(&mut self, reply: AgentReply) -> Effect {
        if self.transition(TransitionReason::ReplyOk).is_err() {
            return Effect::None;
        }

        self.aux.last_reply = Some(reply.text.clone());
        self.aux.last_error = None;
        if let Some(id) = reply.session_id.clone() {
            self.aux.session_id = Some(id.clone());
            let store = self.session_store.clone();
            tokio::spawn(async move {
                if let Err(e) = store.save_session_id(Some(&id)).await {
                    warn!(error = %e, "failed to persist session id");
                }
            });
        }

        self.sink.emit(VoiceEvent::Response {
            text: reply.text.clone(),
            session_id: reply.session_id.clone(),
            duration_ms: reply.latency_ms,
        });

        Effect::StartSpeaking(reply.text)
    }

    /// Agent failures are always recoverable: the session returns to
    /// `listening` and the session id already held is left untouched, so a
    /// transient outage never forces a fresh conversation on the agent side.
    fn on_agent_error(&mut self, err: AgentTransportError) {
        let core_err = match err {
            AgentTransportError::Unreachable(m) | AgentTransportError::Rejected(m) => CoreError::AgentUnreachable(m),
            AgentTransportError::Timeout(d) => CoreError::GatewayTimeout(d),
        };
        if self.transition(TransitionReason::ReplyErr(core_err.to_string())).is_err() {
            return;
        }
        self.aux.last_error = Some(core_err.to_string());
        self.sink.emit(VoiceEvent::Error {
            kind: core_err.kind(),
            message: core_err.to_string(),
        });
    }

    fn on_barge_in(&mut self, probability: f32) -> Effect {
        if !self.barge_in_enabled || self.state != ConversationState::Speaking {
            return Effect::None;
        }
        if let Some(until) = self.barge_in_cooldown_until {
            if Instant::now() < until {
                debug!("barge-in ignored: inside cooldown window");
                return Effect::None;
            }
        }
        if self.transition(TransitionReason::BargeIn).is_err() {
            return Effect::None;
        }

        self.barge_in_cooldown_until = Some(Instant::now() + self.barge_in_cooldown);
        self.aux.last_barge_in_at_ms = Some(now_ms());
        self.sink.emit(VoiceEvent::BargeIn { probability });
        Effect::StopPlayback
    }

    fn on_playback_complete(&mut self) {
        let _ = self.transition(TransitionReason::PlaybackComplete);
        self.sink.emit(VoiceEvent::SpeakingComplete);
    }

    fn on_playback_error(&mut self, message: String) {
        let core_err = CoreError::TtsFailed(message);
        if self.transition(TransitionReason::ReplyErr(core_err.to_string())).is_ok() {
            self.aux.last_error = Some(core_err.to_string());
            self.sink.emit(VoiceEvent::Error {
                kind: core_err.kind(),
                message: core_err.to_string(),
            });
        }
    }

    fn on_connection_edge(&mut self, connected: bool) {
        self.aux.agent_connected = connected;
        self.sink.emit(VoiceEvent::ConnectionChanged { connected });
    }

    /// A fatal component error (device loss) ends the session; anything
    /// else is recorded and the session returns to `listening`.
    fn on_component_error(&mut self, err: CoreError) -> Option<CoreError> {
        let fatal = err.is_fatal();
        if fatal {
            let _ = self.transition(TransitionReason::Fatal(err.to_string()));
        }
        self.aux.last_error = Some(err.to_string());
        self.sink.emit(VoiceEvent::Error {
            kind: err.kind(),
            message: err.to_string(),
        });
        fatal.then_some(err)
    }

    fn reset_session(&mut self) {
        self.aux.session_id = None;
        let store = self.session_store.clone();
        tokio::spawn(async move {
            if let Err(e) = store.save_session_id(None).await {
                warn!(error = %e, "failed to clear persisted session id");
            }
        });
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

pub struct SessionManager {
    fsm: Fsm,

    speech: SpeechPipeline,
    playback: Arc<Mutex<PlaybackPipeline>>,
    connection_monitor: ConnectionMonitor,

    speech_tx: mpsc::UnboundedSender<SpeechEvent>,
    speech_rx: mpsc::UnboundedReceiver<SpeechEvent>,
    playback_tx: mpsc::UnboundedSender<PlaybackPipelineEvent>,
    playback_rx: mpsc::UnboundedReceiver<PlaybackPipelineEvent>,
    connection_rx: mpsc::UnboundedReceiver<bool>,
    agent_reply_rx: mpsc::UnboundedReceiver<Result<AgentReply, AgentTransportError>>,
}

impl SessionManager {
    /// Constructs every owned/shared collaborator from `config`. The
    /// hosting binary should have already checked model assets exist (see
    /// `ModelPaths::check`); construction here fails the same way if they
    /// are missing regardless, since C5/C6 re-check on their own.
    pub fn new(
        config: EngineConfig,
        agent: Arc<dyn AgentTransportPort>,
        session_store: Arc<dyn SessionPersistencePort>,
        sink: Arc<dyn VoiceEventSink>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let audio = Arc::new(AudioThreadHandle::spawn()?);
        let stt = Arc::new(SttEngine::new(&config.stt)?);
        let tts = Arc::new(TtsEngine::new(&config.tts)?);

        let capture_frame_duration_ms =
            (config.audio.frame_samples as u32 * 1000) / config.audio.capture_sample_rate.max(1);
        let speech = SpeechPipeline::new(
            audio.clone(),
            config.vad.clone(),
            capture_frame_duration_ms,
            config.audio.frame_samples,
            stt,
        );
        let playback = Arc::new(Mutex::new(PlaybackPipeline::new(
            audio,
            tts,
            config.jitter.clone(),
            config.audio.playback_sample_rate,
        )));

        let (speech_tx, speech_rx) = mpsc::unbounded_channel();
        let (playback_tx, playback_rx) = mpsc::unbounded_channel();
        let (connection_tx, connection_rx) = mpsc::unbounded_channel();
        let (agent_reply_tx, agent_reply_rx) = mpsc::unbounded_channel();

        let connection_monitor =
            ConnectionMonitor::start(agent.clone(), config.session.connection_probe_interval, connection_tx);

        let fsm = Fsm {
            agent,
            session_store,
            sink,
            barge_in_enabled: config.session.barge_in_enabled,
            barge_in_cooldown: config.session.barge_in_cooldown,
            agent_deadline: config.agent.deadline,
            state: ConversationState::Idle,
            aux: SessionState::default(),
            barge_in_cooldown_until: None,
            agent_reply_tx,
        };

        Ok(Self {
            fsm,
            speech,
            playback,
            connection_monitor,
            speech_tx,
            speech_rx,
            playback_tx,
            playback_rx,
            connection_rx,
            agent_reply_rx,
        })
    }

    #[must_use]
    pub fn state(&self) -> ConversationState {
        self.fsm.state()
    }

    #[must_use]
    pub fn aux(&self) -> &SessionState {
        self.fsm.aux()
    }

    /// Drives the reactor until a `Stop` command or a fatal component
    /// error. Returns the fatal error, if any, so the caller (voice-cli)
    /// can map it onto an exit code.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SessionCommand>) -> Result<(), CoreError> {
        self.start().await?;

        let exit = loop {
            tokio::select! {
                Some(event) = self.speech_rx.recv() => {
                    if let Some(fatal) = self.handle_speech_event(event).await {
                        break Err(fatal);
                    }
                }
                Some(event) = self.playback_rx.recv() => {
                    self.handle_playback_event(event).await;
                }
                Some(connected) = self.connection_rx.recv() => {
                    self.fsm.on_connection_edge(connected);
                }
                Some(result) = self.agent_reply_rx.recv() => {
                    self.handle_agent_reply(result).await;
                }
                Some(cmd) = commands.recv() => {
                    match cmd {
                        SessionCommand::Stop => break Ok(()),
                        SessionCommand::ResetSession => self.fsm.reset_session(),
                    }
                }
                else => break Ok(()),
            }
        };

        self.shutdown().await;
        exit
    }

    async fn start(&mut self) -> Result<(), CoreError> {
        match self.fsm.session_store.load_session_id().await {
            Ok(id) => self.fsm.aux.session_id = id,
            Err(e) => warn!(error = %e, "failed to load persisted session id"),
        }
        self.speech.start(self.speech_tx.clone()).await?;
        self.fsm.on_start()
    }

    async fn shutdown(&mut self) {
        self.speech.stop().await;
        self.playback.lock().await.stop().await;
        self.connection_monitor.stop();
        self.fsm.on_stop();
    }

    /// Returns `Some(fatal_error)` when the caller should end the session.
    async fn handle_speech_event(&mut self, event: SpeechEvent) -> Option<CoreError> {
        match event {
            SpeechEvent::Transcript(t) => {
                self.fsm.on_transcript(t);
                None
            }
            SpeechEvent::EmptyTranscript { reason } => {
                self.fsm.on_empty_transcript(reason);
                None
            }
            SpeechEvent::BargeIn { probability } => {
                self.apply_barge_in(probability).await;
                None
            }
            SpeechEvent::Error(e) => self.fsm.on_component_error(e),
        }
    }

    async fn handle_agent_reply(&mut self, result: Result<AgentReply, AgentTransportError>) {
        let effect = match result {
            Ok(reply) => self.fsm.on_agent_reply(reply),
            Err(e) => {
                self.fsm.on_agent_error(e);
                Effect::None
            }
        };
        self.apply_effect(effect).await;
    }

    async fn apply_barge_in(&mut self, probability: f32) {
        let effect = self.fsm.on_barge_in(probability);
        self.apply_effect(effect).await;
    }

    async fn apply_effect(&mut self, effect: Effect) {
        match effect {
            Effect::None => {}
            Effect::StartSpeaking(text) => {
                self.speech.set_playback_active(true);
                let playback = self.playback.clone();
                let tx = self.playback_tx.clone();
                tokio::spawn(async move {
                    let mut guard = playback.lock().await;
                    if let Err(e) = guard.speak(text, tx.clone()).await {
                        let _ = tx.send(PlaybackPipelineEvent::Error(e.to_string()));
                    }
                });
            }
            Effect::StopPlayback => {
                self.speech.set_playback_active(false);
                let playback = self.playback.clone();
                tokio::spawn(async move {
                    playback.lock().await.stop().await;
                });
            }
        }
    }

    async fn handle_playback_event(&mut self, event: PlaybackPipelineEvent) {
        match event {
            PlaybackPipelineEvent::SpeakingStarted => {
                self.fsm.sink.emit(VoiceEvent::SpeakingStarted);
            }
            PlaybackPipelineEvent::SentenceStarted { .. } => {
                // Internal synthesis progress; not part of the observable surface.
            }
            PlaybackPipelineEvent::SpeakingComplete => {
                self.speech.set_playback_active(false);
                self.fsm.on_playback_complete();
            }
            PlaybackPipelineEvent::SpeakingStopped => {
                self.fsm.sink.emit(VoiceEvent::SpeakingStopped);
            }
            PlaybackPipelineEvent::Error(message) => {
                self.speech.set_playback_active(false);
                self.fsm.on_playback_error(message);
                let playback = self.playback.clone();
                tokio::spawn(async move {
                    playback.lock().await.stop().await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;
    use voice_core::ports::SessionPersistenceError;

    struct FakeAgent {
        reply: StdMutex<Option<Result<AgentReply, AgentTransportError>>>,
    }

    #[async_trait]
    impl AgentTransportPort for FakeAgent {
        async fn send(&self, _text: &str, _session_id: Option<&str>) -> Result<AgentReply, AgentTransportError> {
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or(Err(AgentTransportError::Unreachable("no reply configured".into())))
        }

        async fn health_check(&self) -> bool {
            true
        }
    }

    struct FakeStore {
        id: StdMutex<Option<String>>,
    }

    #[async_trait]
    impl SessionPersistencePort for FakeStore {
        async fn load_session_id(&self) -> Result<Option<String>, SessionPersistenceError> {
            Ok(self.id.lock().unwrap().clone())
        }

        async fn save_session_id(&self, id: Option<&str>) -> Result<(), SessionPersistenceError> {
            *self.id.lock().unwrap() = id.map(str::to_string);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Collector {
        events: StdMutex<Vec<VoiceEvent>>,
    }

    impl VoiceEventSink for Collector {
        fn emit(&self, event: VoiceEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    fn state_sequence(collector: &Collector) -> Vec<(ConversationState, ConversationState)> {
        collector
            .events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| match e {
                VoiceEvent::StateChanged { from, to, .. } => Some((*from, *to)),
                _ => None,
            })
            .collect()
    }

    fn fsm(
        agent: Arc<dyn AgentTransportPort>,
        store: Arc<dyn SessionPersistencePort>,
        sink: Arc<Collector>,
    ) -> (Fsm, mpsc::UnboundedReceiver<Result<AgentReply, AgentTransportError>>) {
        let (agent_reply_tx, agent_reply_rx) = mpsc::unbounded_channel();
        let machine = Fsm {
            agent,
            session_store: store,
            sink,
            barge_in_enabled: true,
            barge_in_cooldown: Duration::from_millis(200),
            agent_deadline: Duration::from_secs(30),
            state: ConversationState::Idle,
            aux: SessionState::default(),
            barge_in_cooldown_until: None,
            agent_reply_tx,
        };
        (machine, agent_reply_rx)
    }

    #[test]
    fn allowed_transitions_match_the_table() {
        use ConversationState::{Idle, Listening, Processing, Speaking};
        use TransitionReason::{BargeIn, EmptyTranscript, Fatal, PlaybackComplete, ReplyErr, ReplyOk, Start, Stop, Transcript};

        assert_eq!(allowed_next(Idle, &Start), Some(Listening));
        assert_eq!(allowed_next(Listening, &Transcript), Some(Processing));
        assert_eq!(allowed_next(Listening, &EmptyTranscript), Some(Listening));
        assert_eq!(allowed_next(Processing, &ReplyOk), Some(Speaking));
        assert_eq!(allowed_next(Processing, &ReplyErr("x".into())), Some(Listening));
        assert_eq!(allowed_next(Speaking, &PlaybackComplete), Some(Listening));
        assert_eq!(allowed_next(Speaking, &BargeIn), Some(Listening));
        assert_eq!(allowed_next(Idle, &Stop), Some(Idle));
        assert_eq!(allowed_next(Speaking, &Fatal("x".into())), Some(Idle));
    }

    #[test]
    fn unlisted_transitions_are_rejected() {
        use ConversationState::{Idle, Processing};
        use TransitionReason::Transcript;

        assert_eq!(allowed_next(Idle, &Transcript), None);
        assert_eq!(allowed_next(Processing, &Transcript), None);
    }

    #[tokio::test]
    async fn happy_turn_reaches_speaking_and_records_the_reply() {
        let agent = Arc::new(FakeAgent {
            reply: StdMutex::new(Some(Ok(AgentReply {
                text: "hi there".into(),
                session_id: Some("sess-1".into()),
                latency_ms: 120,
            }))),
        });
        let store = Arc::new(FakeStore { id: StdMutex::new(None) });
        let sink = Arc::new(Collector::default());
        let (mut machine, mut agent_reply_rx) = fsm(agent, store, sink.clone());
        machine.state = ConversationState::Listening;

        machine.on_transcript(Transcript {
            text: "what time is it".into(),
            audio_duration_ms: 900,
            stt_duration_ms: 80,
        });

        let result = agent_reply_rx.recv().await.expect("agent call completes");
        let effect = machine.on_agent_reply(result.expect("configured reply is Ok"));

        assert!(matches!(effect, Effect::StartSpeaking(ref t) if t == "hi there"));
        assert_eq!(machine.state(), ConversationState::Speaking);
        assert_eq!(machine.aux().session_id.as_deref(), Some("sess-1"));
        assert_eq!(
            state_sequence(&sink),
            vec![
                (ConversationState::Listening, ConversationState::Processing),
                (ConversationState::Processing, ConversationState::Speaking),
            ]
        );
    }

    #[test]
    fn garbage_transcript_returns_to_listening_with_last_error_set() {
        let agent = Arc::new(FakeAgent { reply: StdMutex::new(None) });
        let store = Arc::new(FakeStore { id: StdMutex::new(None) });
        let sink = Arc::new(Collector::default());
        let (mut machine, _rx) = fsm(agent, store, sink);
        machine.state = ConversationState::Listening;

        machine.on_empty_transcript("Didn't catch that".into());

        assert_eq!(machine.state(), ConversationState::Listening);
        assert_eq!(machine.aux().last_error.as_deref(), Some("Didn't catch that"));
    }

    #[test]
    fn agent_unreachable_returns_to_listening_without_clearing_session_id() {
        let agent = Arc::new(FakeAgent { reply: StdMutex::new(None) });
        let store = Arc::new(FakeStore { id: StdMutex::new(None) });
        let sink = Arc::new(Collector::default());
        let (mut machine, _rx) = fsm(agent, store, sink);
        machine.state = ConversationState::Processing;
        machine.aux.session_id = Some("prior-session".into());

        machine.on_agent_error(AgentTransportError::Unreachable("connection refused".into()));

        assert_eq!(machine.state(), ConversationState::Listening);
        assert_eq!(machine.aux().session_id.as_deref(), Some("prior-session"));
        assert!(machine.aux().last_error.as_deref().unwrap().contains("agent unreachable"));
    }

    #[test]
    fn barge_in_is_ignored_within_the_cooldown_window() {
        let agent = Arc::new(FakeAgent { reply: StdMutex::new(None) });
        let store = Arc::new(FakeStore { id: StdMutex::new(None) });
        let sink = Arc::new(Collector::default());
        let (mut machine, _rx) = fsm(agent, store, sink.clone());
        machine.state = ConversationState::Speaking;
        machine.barge_in_cooldown_until = Some(Instant::now() + Duration::from_secs(5));

        let effect = machine.on_barge_in(0.9);

        assert!(matches!(effect, Effect::None));
        assert_eq!(machine.state(), ConversationState::Speaking);
        assert!(state_sequence(&sink).is_empty());
    }

    #[test]
    fn barge_in_after_cooldown_interrupts_speaking() {
        let agent = Arc::new(FakeAgent { reply: StdMutex::new(None) });
        let store = Arc::new(FakeStore { id: StdMutex::new(None) });
        let sink = Arc::new(Collector::default());
        let (mut machine, _rx) = fsm(agent, store, sink.clone());
        machine.state = ConversationState::Speaking;

        let effect = machine.on_barge_in(0.9);

        assert!(matches!(effect, Effect::StopPlayback));
        assert_eq!(machine.state(), ConversationState::Listening);
        assert!(machine.aux().last_barge_in_at_ms.is_some());
    }

    #[test]
    fn transcript_arriving_while_speaking_is_discarded() {
        let agent = Arc::new(FakeAgent { reply: StdMutex::new(None) });
        let store = Arc::new(FakeStore { id: StdMutex::new(None) });
        let sink = Arc::new(Collector::default());
        let (mut machine, _rx) = fsm(agent, store, sink.clone());
        machine.state = ConversationState::Speaking;

        machine.on_transcript(Transcript {
            text: "stray transcript".into(),
            audio_duration_ms: 900,
            stt_duration_ms: 80,
        });

        assert_eq!(machine.state(), ConversationState::Speaking);
        assert!(state_sequence(&sink).is_empty());
    }

    #[test]
    fn empty_transcript_arriving_while_speaking_is_discarded() {
        let agent = Arc::new(FakeAgent { reply: StdMutex::new(None) });
        let store = Arc::new(FakeStore { id: StdMutex::new(None) });
        let sink = Arc::new(Collector::default());
        let (mut machine, _rx) = fsm(agent, store, sink.clone());
        machine.state = ConversationState::Speaking;

        machine.on_empty_transcript("Didn't catch that".into());

        assert_eq!(machine.state(), ConversationState::Speaking);
        assert!(state_sequence(&sink).is_empty());
    }

    #[test]
    fn disabled_barge_in_never_transitions_or_emits() {
        let agent = Arc::new(FakeAgent { reply: StdMutex::new(None) });
        let store = Arc::new(FakeStore { id: StdMutex::new(None) });
        let sink = Arc::new(Collector::default());
        let (mut machine, _rx) = fsm(agent, store, sink.clone());
        machine.barge_in_enabled = false;
        machine.state = ConversationState::Speaking;

        let effect = machine.on_barge_in(0.95);

        assert!(matches!(effect, Effect::None));
        assert_eq!(machine.state(), ConversationState::Speaking);
        assert!(sink.events.lock().unwrap().iter().all(|e| !matches!(e, VoiceEvent::BargeIn { .. })));
    }

    #[test]
    fn restart_continuity_adopts_the_persisted_session_id() {
        let agent = Arc::new(FakeAgent { reply: StdMutex::new(None) });
        let store = Arc::new(FakeStore {
            id: StdMutex::new(Some("resumed-session".into())),
        });
        let sink = Arc::new(Collector::default());
        let (mut machine, _rx) = fsm(agent, store.clone(), sink);

        // Mirrors `SessionManager::start`'s load step without needing a
        // constructed `SessionManager` (which requires real audio/STT/TTS).
        machine.aux.session_id = store.id.lock().unwrap().clone();

        assert_eq!(machine.aux().session_id.as_deref(), Some("resumed-session"));
    }

    #[tokio::test]
    async fn reset_session_clears_the_in_memory_id() {
        let agent = Arc::new(FakeAgent { reply: StdMutex::new(None) });
        let store = Arc::new(FakeStore {
            id: StdMutex::new(Some("old-session".into())),
        });
        let sink = Arc::new(Collector::default());
        let (mut machine, _rx) = fsm(agent, store, sink);
        machine.aux.session_id = Some("old-session".into());

        machine.reset_session();

        assert_eq!(machine.aux().session_id, None);
    }
}
