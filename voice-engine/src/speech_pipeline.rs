//! Speech Pipeline (C10).
//!
//! Wires Audio Capture (C2) through the VAD Processor (C4) into the STT
//! Engine (C5) and exposes utterance-level events. Runs as its own async
//! task, fed by a dedicated OS thread that bridges the capture callback's
//! blocking channel into the tokio runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use voice_core::{CoreError, Transcript, Utterance};

use crate::audio_thread::AudioThreadHandle;
use crate::config::VadConfig;
use crate::stt::{SttEngine, SttOutcome};
use crate::vad::{VadEvent, VadProcessor};

#[derive(Debug)]
pub enum SpeechEvent {
    Transcript(Transcript),
    EmptyTranscript { reason: String },
    BargeIn { probability: f32 },
    Error(CoreError),
}

pub struct SpeechPipeline {
    audio: Arc<AudioThreadHandle>,
    stt: Arc<SttEngine>,
    frame_samples: usize,
    vad: Arc<Mutex<VadProcessor>>,
    task: Option<JoinHandle<()>>,
    stopped: Arc<AtomicBool>,
    event_tx: Option<mpsc::UnboundedSender<SpeechEvent>>,
}

impl SpeechPipeline {
    #[must_use]
    pub fn new(
        audio: Arc<AudioThreadHandle>,
        vad_config: VadConfig,
        frame_duration_ms: u32,
        frame_samples: usize,
        stt: Arc<SttEngine>,
    ) -> Self {
        Self {
            audio,
            stt,
            frame_samples,
            vad: Arc::new(Mutex::new(VadProcessor::new(
                vad_config,
                frame_duration_ms,
                frame_samples as u32 * 1000 / frame_duration_ms.max(1),
            ))),
            task: None,
            stopped: Arc::new(AtomicBool::new(false)),
            event_tx: None,
        }
    }

    /// Begin streaming. `event_tx` receives utterance-level events in
    /// capture order for as long as the pipeline runs.
    pub async fn start(&mut self, event_tx: mpsc::UnboundedSender<SpeechEvent>) -> Result<(), CoreError> {
        let (frame_tx, frame_rx) = std_mpsc::channel::<Vec<i16>>();
        self.audio.start_capture(self.frame_samples, frame_tx).await?;

        let (async_tx, mut async_rx) = mpsc::unbounded_channel::<Vec<i16>>();
        std::thread::Builder::new()
            .name("voicebridge-capture-bridge".to_string())
            .spawn(move || {
                while let Ok(frame) = frame_rx.recv() {
                    if async_tx.send(frame).is_err() {
                        break;
                    }
                }
            })
            .map_err(|e| CoreError::MicUnavailable(e.to_string()))?;

        let vad = self.vad.clone();
        let stt = self.stt.clone();
        let stopped = self.stopped.clone();
        self.event_tx = Some(event_tx.clone());

        let task = tokio::spawn(async move {
            while let Some(frame) = async_rx.recv().await {
                if stopped.load(Ordering::Relaxed) {
                    break;
                }
                let events = {
                    let mut vad = vad.lock().expect("vad mutex poisoned");
                    vad.process_frame(&frame)
                };
                for event in events {
                    handle_vad_event(event, &stt, &event_tx).await;
                }
            }
            debug!("speech pipeline capture loop ended");
        });

        self.task = Some(task);
        Ok(())
    }

    /// Toggles the VAD's barge-in threshold. Called by the session manager
    /// on entering/leaving `speaking`.
    pub fn set_playback_active(&self, active: bool) {
        self.vad
            .lock()
            .expect("vad mutex poisoned")
            .set_playback_active(active);
    }

    /// Idempotent; drains any in-progress utterance through STT, then stops
    /// capture and the processing task.
    pub async fn stop(&mut self) {
        self.stopped.store(true, Ordering::Relaxed);
        self.audio.stop_capture().await;

        let flushed = self.vad.lock().expect("vad mutex poisoned").force_end_speech();
        if let (Some(event @ VadEvent::SpeechEnd { .. }), Some(tx)) = (flushed, self.event_tx.as_ref()) {
            handle_vad_event(event, &self.stt, tx).await;
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn handle_vad_event(
    event: VadEvent,
    stt: &Arc<SttEngine>,
    event_tx: &mpsc::UnboundedSender<SpeechEvent>,
) {
    match event {
        VadEvent::SpeechStart => {}
        VadEvent::BargeIn { probability } => {
            let _ = event_tx.send(SpeechEvent::BargeIn { probability });
        }
        VadEvent::SpeechEnd { samples, duration_ms } => {
            let utterance = Utterance { samples, duration_ms };
            let outcome = stt.transcribe(&utterance).await;
            let speech_event = match outcome {
                Ok(SttOutcome::Transcript(t)) => SpeechEvent::Transcript(t),
                Ok(SttOutcome::Empty) => SpeechEvent::EmptyTranscript {
                    reason: "Didn't catch that".to_string(),
                },
                Err(e) => {
                    warn!(error = %e, "STT transcription failed");
                    SpeechEvent::Error(e)
                }
            };
            let _ = event_tx.send(speech_event);
        }
    }
}
