//! VAD Processor (C4).
//!
//! Classifies 30 ms frames as speech/non-speech and turns runs of frames
//! into `speech_started`/`speech_ended` events, with a dual-threshold
//! barge-in signal while playback is active.

use std::collections::VecDeque;

use tracing::debug;

use crate::config::VadConfig;

/// Events emitted by the processor. A single `process_frame` call may
/// produce more than one (e.g. a barge-in frame is also a speech frame).
#[derive(Debug, Clone, PartialEq)]
pub enum VadEvent {
    SpeechStart,
    SpeechEnd { samples: Vec<i16>, duration_ms: u64 },
    BargeIn { probability: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Listening,
    Speech,
}

/// Produces a speech probability `p ∈ [0, 1]` for one frame.
///
/// The energy-based classifier below is the default; `VadConfig::model_path`
/// is reserved for a future neural classifier and is accepted but unused
/// here, matching the energy fallback the teacher's own VAD keeps alongside
/// its neural path when no model is configured.
pub trait SpeechClassifier: Send {
    fn classify(&mut self, frame: &[i16]) -> f32;
}

/// RMS-energy classifier. Maps a configurable `[0, 1]` threshold onto an RMS
/// range the way `gglib-voice` does, so `t_normal`/`t_bargein` remain
/// meaningful probabilities even though the underlying signal is energy.
pub struct EnergyClassifier;

impl EnergyClassifier {
    fn rms(frame: &[i16]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = frame.iter().map(|s| f64::from(*s) * f64::from(*s)).sum();
        ((sum_sq / frame.len() as f64).sqrt() / f64::from(i16::MAX)) as f32
    }
}

impl SpeechClassifier for EnergyClassifier {
    fn classify(&mut self, frame: &[i16]) -> f32 {
        // Maps an RMS range of roughly [0.001, 0.05] onto [0, 1], the same
        // calibration the energy fallback in the teacher's VAD used.
        let rms = Self::rms(frame);
        ((rms - 0.001) / (0.05 - 0.001)).clamp(0.0, 1.0)
    }
}

pub struct VadProcessor {
    config: VadConfig,
    frame_duration_ms: u32,
    classifier: Box<dyn SpeechClassifier>,
    state: State,
    playback_active: bool,
    barge_in_fired: bool,
    speech_buffer: Vec<i16>,
    pre_roll: VecDeque<Vec<i16>>,
    pre_roll_frame_capacity: usize,
    speech_frames: u32,
    silence_frames: u32,
    sample_rate: u32,
}

impl VadProcessor {
    /// `sample_rate` is the PCM sample rate of the frames this processor
    /// will be fed (16 kHz for capture, per §4.1) — used only to convert an
    /// utterance's accumulated sample count into `duration_ms`.
    #[must_use]
    pub fn new(config: VadConfig, frame_duration_ms: u32, sample_rate: u32) -> Self {
        let pre_roll_frame_capacity =
            (config.pre_roll_ms / frame_duration_ms.max(1)).max(1) as usize;
        Self {
            config,
            frame_duration_ms,
            classifier: Box::new(EnergyClassifier),
            state: State::Listening,
            playback_active: false,
            barge_in_fired: false,
            speech_buffer: Vec::new(),
            pre_roll: VecDeque::with_capacity(pre_roll_frame_capacity),
            pre_roll_frame_capacity,
            speech_frames: 0,
            silence_frames: 0,
            sample_rate: sample_rate.max(1),
        }
    }

    /// Toggled by C12 on entering/leaving `speaking`; switches the
    /// classification threshold to `t_bargein` and resets the
    /// once-per-window barge-in latch.
    pub fn set_playback_active(&mut self, active: bool) {
        self.playback_active = active;
        if active {
            self.barge_in_fired = false;
        }
        debug!(active, "vad playback_active toggled");
    }

    fn threshold(&self) -> f32 {
        if self.playback_active {
            self.config.t_bargein
        } else {
            self.config.t_normal
        }
    }

    fn silence_frames_needed(&self) -> u32 {
        (self.config.silence_duration_ms / self.frame_duration_ms.max(1)).max(1)
    }

    fn min_speech_frames(&self) -> u32 {
        (self.config.min_speech_ms / self.frame_duration_ms.max(1)).max(1)
    }

    /// Process one 30 ms frame.
    pub fn process_frame(&mut self, frame: &[i16]) -> Vec<VadEvent> {
        let p = self.classifier.classify(frame);
        let threshold = self.threshold();
        let mut events = Vec::new();

        let is_speech = p >= threshold;

        if is_speech && self.playback_active && p >= self.config.t_bargein && !self.barge_in_fired
        {
            events.push(VadEvent::BargeIn { probability: p });
            self.barge_in_fired = true;
        }

        match self.state {
            State::Listening => {
                if is_speech {
                    self.state = State::Speech;
                    self.speech_buffer.clear();
                    self.speech_buffer
                        .extend(self.pre_roll.iter().flatten().copied());
                    self.speech_buffer.extend_from_slice(frame);
                    self.speech_frames = 1;
                    self.silence_frames = 0;
                    events.push(VadEvent::SpeechStart);
                } else {
                    self.push_pre_roll(frame);
                }
            }
            State::Speech => {
                self.speech_buffer.extend_from_slice(frame);
                if is_speech {
                    self.speech_frames += 1;
                    self.silence_frames = 0;
                } else {
                    self.silence_frames += 1;
                    if self.silence_frames >= self.silence_frames_needed() {
                        if let Some(event) = self.finalize_utterance() {
                            events.push(event);
                        }
                    }
                }
            }
        }

        events
    }

    /// Drain any in-progress segment as `speech_ended` without waiting for
    /// silence. Used at shutdown.
    pub fn force_end_speech(&mut self) -> Option<VadEvent> {
        if self.state == State::Speech {
            self.finalize_utterance()
        } else {
            None
        }
    }

    fn finalize_utterance(&mut self) -> Option<VadEvent> {
        let samples = std::mem::take(&mut self.speech_buffer);
        let speech_frames = self.speech_frames;
        self.reset_to_listening();

        if speech_frames < self.min_speech_frames() {
            debug!(speech_frames, "utterance below min_speech_ms, discarded");
            return None;
        }

        let duration_ms = samples.len() as u64 * 1000 / u64::from(self.sample_rate);
        Some(VadEvent::SpeechEnd {
            samples,
            duration_ms,
        })
    }

    fn reset_to_listening(&mut self) {
        self.state = State::Listening;
        self.speech_frames = 0;
        self.silence_frames = 0;
        self.pre_roll.clear();
    }

    fn push_pre_roll(&mut self, frame: &[i16]) {
        if self.pre_roll.len() >= self.pre_roll_frame_capacity {
            self.pre_roll.pop_front();
        }
        self.pre_roll.push_back(frame.to_vec());
    }

    #[must_use]
    pub fn is_in_speech(&self) -> bool {
        self.state == State::Speech
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> VadConfig {
        VadConfig {
            t_normal: 0.5,
            t_bargein: 0.7,
            silence_duration_ms: 90,
            min_speech_ms: 60,
            pre_roll_ms: 60,
            model_path: None,
        }
    }

    fn loud_frame() -> Vec<i16> {
        vec![20_000i16; 480]
    }

    fn quiet_frame() -> Vec<i16> {
        vec![0i16; 480]
    }

    #[test]
    fn starts_in_listening() {
        let vad = VadProcessor::new(config(), 30, 16_000);
        assert!(!vad.is_in_speech());
    }

    #[test]
    fn speech_started_then_ended_after_silence() {
        let mut vad = VadProcessor::new(config(), 30, 16_000);
        let started = vad.process_frame(&loud_frame());
        assert_eq!(started, vec![VadEvent::SpeechStart]);
        assert!(vad.is_in_speech());

        // Three silent frames (90ms) should close the utterance.
        let mut ended = None;
        for _ in 0..3 {
            let events = vad.process_frame(&quiet_frame());
            if let Some(e) = events.into_iter().find(|e| matches!(e, VadEvent::SpeechEnd { .. }))
            {
                ended = Some(e);
            }
        }
        assert!(matches!(ended, Some(VadEvent::SpeechEnd { .. })));
        assert!(!vad.is_in_speech());
    }

    #[test]
    fn short_utterance_is_discarded_silently() {
        let mut vad = VadProcessor::new(config(), 30, 16_000);
        vad.process_frame(&loud_frame()); // 1 frame = 30ms, below min_speech_ms=60
        for _ in 0..3 {
            let events = vad.process_frame(&quiet_frame());
            assert!(!events.iter().any(|e| matches!(e, VadEvent::SpeechEnd { .. })));
        }
    }

    #[test]
    fn barge_in_fires_once_per_playback_window() {
        let mut vad = VadProcessor::new(config(), 30, 16_000);
        vad.set_playback_active(true);
        let first = vad.process_frame(&loud_frame());
        assert!(first.iter().any(|e| matches!(e, VadEvent::BargeIn { .. })));

        let second = vad.process_frame(&loud_frame());
        assert!(!second.iter().any(|e| matches!(e, VadEvent::BargeIn { .. })));

        // A new playback window resets the latch.
        vad.set_playback_active(false);
        vad.set_playback_active(true);
        let third = vad.process_frame(&loud_frame());
        assert!(third.iter().any(|e| matches!(e, VadEvent::BargeIn { .. })));
    }

    #[test]
    fn force_end_speech_drains_in_progress_segment() {
        let mut vad = VadProcessor::new(config(), 30, 16_000);
        for _ in 0..3 {
            vad.process_frame(&loud_frame());
        }
        let event = vad.force_end_speech();
        assert!(matches!(event, Some(VadEvent::SpeechEnd { .. })));
        assert!(!vad.is_in_speech());
    }
}
