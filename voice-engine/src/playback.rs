//! Audio Playback (C3).
//!
//! Owns the rodio output stream, which is `!Send`; instances of this type
//! never cross a thread boundary — [`crate::audio_thread`] hosts one on a
//! dedicated OS thread alongside [`crate::capture::AudioCapture`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use tracing::{debug, info};
use voice_core::CoreError;

pub struct AudioPlayback {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    sink: Option<Sink>,
    sample_rate: u32,
    is_playing: Arc<AtomicBool>,
    duration_written: Duration,
}

impl AudioPlayback {
    pub fn new() -> Result<Self, CoreError> {
        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| CoreError::SpeakerUnavailable(e.to_string()))?;
        Ok(Self {
            _stream: stream,
            stream_handle,
            sink: None,
            sample_rate: 22_050,
            is_playing: Arc::new(AtomicBool::new(false)),
            duration_written: Duration::ZERO,
        })
    }

    /// Begin a fresh playback stream at `sample_rate`. Replaces any
    /// in-progress sink (implicitly stopping it).
    pub fn start(&mut self, sample_rate: u32) -> Result<(), CoreError> {
        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| CoreError::SpeakerUnavailable(e.to_string()))?;
        self.sink = Some(sink);
        self.sample_rate = sample_rate;
        self.duration_written = Duration::ZERO;
        self.is_playing.store(true, Ordering::Relaxed);
        debug!(sample_rate, "playback started");
        Ok(())
    }

    /// Append one chunk to the sink's queue. Returns whether the caller may
    /// keep writing without backpressure (rodio's sink queue is effectively
    /// unbounded in memory, so this is always `true` once a sink exists).
    pub fn write(&mut self, chunk: &[i16]) -> bool {
        let Some(sink) = &self.sink else {
            return false;
        };
        let samples: Vec<f32> = chunk.iter().map(|s| f32::from(*s) / 32768.0).collect();
        self.duration_written +=
            Duration::from_secs_f64(samples.len() as f64 / f64::from(self.sample_rate));
        sink.append(SamplesBuffer::new(1, self.sample_rate, samples));
        true
    }

    /// Signal no more chunks are coming and block until the sink drains
    /// naturally. The caller (C11) awaits this via a worker thread proxy.
    pub fn end(&mut self) {
        if let Some(sink) = &self.sink {
            sink.sleep_until_end();
        }
        self.is_playing.store(false, Ordering::Relaxed);
        info!(duration_ms = self.duration_written.as_millis(), "playback drained");
    }

    /// Discard remaining buffered audio and terminate immediately. Used for
    /// barge-in; idempotent.
    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.is_playing.store(false, Ordering::Relaxed);
        debug!("playback stopped (forced)");
    }

    #[must_use]
    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_not_playing() {
        let flag = Arc::new(AtomicBool::new(false));
        assert!(!flag.load(Ordering::Relaxed));
    }
}
