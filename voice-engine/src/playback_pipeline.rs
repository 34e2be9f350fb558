//! Playback Pipeline (C11).
//!
//! Wires the TTS Synthesizer (C6) through the Jitter Buffer (C7) into Audio
//! Playback (C3) and exposes speaking events. Playback only starts once C7
//! first crosses its low watermark, bounding first-audio latency while
//! absorbing synthesis jitter.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::debug;
use voice_core::CoreError;

use crate::audio_thread::AudioThreadHandle;
use crate::jitter_buffer::{ms_to_samples, JitterBuffer, JitterEvent};
use crate::tts::{TtsEngine, TtsEvent};

#[derive(Debug, Clone)]
pub enum PlaybackPipelineEvent {
    SpeakingStarted,
    SentenceStarted { index: usize, sentence: String, total: usize },
    SpeakingComplete,
    SpeakingStopped,
    Error(String),
}

pub struct PlaybackPipeline {
    audio: Arc<AudioThreadHandle>,
    tts: Arc<TtsEngine>,
    jitter: Arc<Mutex<JitterBuffer>>,
    cancel: Arc<AtomicBool>,
    frame_duration_ms: u32,
    sample_rate: u32,
    synth_task: Option<JoinHandle<()>>,
    pull_task: Option<JoinHandle<()>>,
}

impl PlaybackPipeline {
    #[must_use]
    pub fn new(
        audio: Arc<AudioThreadHandle>,
        tts: Arc<TtsEngine>,
        jitter_config: crate::config::JitterBufferConfig,
        sample_rate: u32,
    ) -> Self {
        let frame_duration_ms = jitter_config.frame_duration_ms;
        Self {
            audio,
            tts,
            jitter: Arc::new(Mutex::new(JitterBuffer::new(&jitter_config, sample_rate))),
            cancel: Arc::new(AtomicBool::new(false)),
            frame_duration_ms,
            sample_rate,
            synth_task: None,
            pull_task: None,
        }
    }

    /// Begin synthesizing and playing `text`. Only one stream may be active
    /// at a time; callers must await the previous `speaking_complete` or
    /// `speaking_stopped` before calling again (§5).
    pub async fn speak(
        &mut self,
        text: String,
        event_tx: mpsc::UnboundedSender<PlaybackPipelineEvent>,
    ) -> Result<(), CoreError> {
        self.cancel.store(false, Ordering::Relaxed);
        self.jitter.lock().expect("jitter mutex poisoned").clear();

        let ready = Arc::new(Notify::new());
        let ready_fired = Arc::new(AtomicBool::new(false));

        self.synth_task = Some(self.spawn_synth_task(text, event_tx.clone(), ready.clone(), ready_fired.clone()));

        if !ready_fired.load(Ordering::Relaxed) {
            ready.notified().await;
        }

        self.audio.start_playback(self.sample_rate).await?;
        let _ = event_tx.send(PlaybackPipelineEvent::SpeakingStarted);

        self.pull_task = Some(self.spawn_pull_task(event_tx));
        Ok(())
    }

    fn spawn_synth_task(
        &self,
        text: String,
        event_tx: mpsc::UnboundedSender<PlaybackPipelineEvent>,
        ready: Arc<Notify>,
        ready_fired: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let tts = self.tts.clone();
        let jitter = self.jitter.clone();
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let chunk_jitter = jitter.clone();
            let event_tx_for_events = event_tx.clone();
            let chunk_ready = ready.clone();
            let chunk_ready_fired = ready_fired.clone();
            let result = tts
                .speak(
                    &text,
                    &cancel,
                    move |chunk| {
                        let events = chunk_jitter
                            .lock()
                            .expect("jitter mutex poisoned")
                            .push(&chunk.samples);
                        if events.contains(&JitterEvent::Ready) {
                            chunk_ready_fired.store(true, Ordering::Relaxed);
                            chunk_ready.notify_one();
                        }
                    },
                    move |tts_event| {
                        if let TtsEvent::SentenceStarted { index, sentence, total } = tts_event {
                            let _ = event_tx_for_events.send(PlaybackPipelineEvent::SentenceStarted {
                                index,
                                sentence,
                                total,
                            });
                        }
                    },
                )
                .await;

            let drained_events = jitter.lock().expect("jitter mutex poisoned").mark_producer_done();
            if let Err(e) = result {
                let _ = event_tx.send(PlaybackPipelineEvent::Error(e.to_string()));
            }
            let _ = drained_events;

            // Synthesis ended (completed, stopped, or errored) without ever
            // crossing the low watermark — e.g. empty/whitespace text or a
            // first-sentence failure. Wake `speak()`'s wait so it doesn't
            // block forever holding the caller's playback lock.
            if !ready_fired.load(Ordering::Relaxed) {
                ready.notify_one();
            }
        })
    }

    fn spawn_pull_task(
        &self,
        event_tx: mpsc::UnboundedSender<PlaybackPipelineEvent>,
    ) -> JoinHandle<()> {
        let jitter = self.jitter.clone();
        let audio = self.audio.clone();
        let cancel = self.cancel.clone();
        let frame_samples = ms_to_samples(self.frame_duration_ms, self.sample_rate);
        let frame_duration = Duration::from_millis(u64::from(self.frame_duration_ms));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(frame_duration);
            loop {
                ticker.tick().await;
                if cancel.load(Ordering::Relaxed) {
                    break;
                }

                let (data, events) = jitter.lock().expect("jitter mutex poisoned").pull(frame_samples);
                if !data.is_empty() {
                    audio.write_playback(data).await;
                }

                let drained = events.contains(&JitterEvent::Drained);
                let underrun = events.iter().any(|e| matches!(e, JitterEvent::Underrun { .. }));

                if drained {
                    audio.end_playback().await;
                    let _ = event_tx.send(PlaybackPipelineEvent::SpeakingComplete);
                    break;
                }

                if underrun {
                    debug!("jitter buffer underrun, waiting for more data");
                }
            }
        })
    }

    /// Cancels in-flight synthesis, clears C7, and hard-stops C3. Used for
    /// barge-in and fatal errors during `speaking`.
    pub async fn stop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(task) = self.synth_task.take() {
            task.abort();
        }
        if let Some(task) = self.pull_task.take() {
            task.abort();
        }
        self.jitter.lock().expect("jitter mutex poisoned").clear();
        self.audio.stop_playback().await;
    }
}
