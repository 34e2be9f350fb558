//! Audio Capture (C2).
//!
//! Owns the cpal input stream, which is `!Send`; instances of this type
//! never cross a thread boundary — [`crate::audio_thread`] hosts one on a
//! dedicated OS thread and proxies requests into it over channels.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::Stream;
use rubato::{FftFixedIn, Resampler};
use tracing::{debug, error, info, warn};
use voice_core::CoreError;

pub const CAPTURE_SAMPLE_RATE: u32 = 16_000;

/// Streams microphone PCM frames of exactly `frame_samples` samples at
/// `CAPTURE_SAMPLE_RATE`, in order, with no duplication.
pub struct AudioCapture {
    stream: Option<Stream>,
    is_recording: Arc<AtomicBool>,
}

impl AudioCapture {
    /// Open the default input device and begin streaming frames to
    /// `frame_tx`. Partial trailing data below a full frame is buffered
    /// until the next write completes it (§4.1).
    pub fn start(frame_samples: usize, frame_tx: Sender<Vec<i16>>) -> Result<Self, CoreError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CoreError::MicUnavailable("no default input device".to_string()))?;

        let config = device
            .default_input_config()
            .map_err(|e| CoreError::MicUnavailable(e.to_string()))?;

        let device_sample_rate = config.sample_rate().0;
        let device_channels = config.channels() as usize;
        let sample_format = config.sample_format();

        let is_recording = Arc::new(AtomicBool::new(true));
        let is_recording_cb = is_recording.clone();

        let pending = Arc::new(Mutex::new(FrameAccumulator::new(
            frame_samples,
            device_sample_rate,
            device_channels,
            frame_tx,
        )));

        let err_fn = |e| error!(error = %e, "audio capture stream error");

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &config.into(),
                move |data: &[f32], _| {
                    if is_recording_cb.load(Ordering::Relaxed) {
                        pending.lock().unwrap().push_f32(data);
                    }
                },
                err_fn,
                None,
            ),
            cpal::SampleFormat::I16 => device.build_input_stream(
                &config.into(),
                move |data: &[i16], _| {
                    if is_recording_cb.load(Ordering::Relaxed) {
                        let f32_data: Vec<f32> =
                            data.iter().map(|s| f32::from(*s) / 32768.0).collect();
                        pending.lock().unwrap().push_f32(&f32_data);
                    }
                },
                err_fn,
                None,
            ),
            other => {
                return Err(CoreError::MicUnavailable(format!(
                    "unsupported sample format: {other:?}"
                )))
            }
        }
        .map_err(|e| CoreError::MicUnavailable(e.to_string()))?;

        stream
            .play()
            .map_err(|e| CoreError::MicUnavailable(e.to_string()))?;

        info!(
            device_sample_rate,
            device_channels, frame_samples, "audio capture started"
        );

        Ok(Self {
            stream: Some(stream),
            is_recording,
        })
    }

    /// Terminate capture promptly. Idempotent.
    pub fn stop(&mut self) {
        self.is_recording.store(false, Ordering::Relaxed);
        if let Some(stream) = self.stream.take() {
            drop(stream);
            debug!("audio capture stopped");
        }
    }
}

impl Drop for AudioCapture {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Resamples device-rate multi-channel audio down to mono 16 kHz and slices
/// it into fixed-size frames, forwarding each completed frame and carrying
/// the remainder forward.
struct FrameAccumulator {
    frame_samples: usize,
    device_sample_rate: u32,
    device_channels: usize,
    resampler: Option<FftFixedIn<f32>>,
    carry: Vec<f32>,
    frame_tx: Sender<Vec<i16>>,
}

impl FrameAccumulator {
    fn new(
        frame_samples: usize,
        device_sample_rate: u32,
        device_channels: usize,
        frame_tx: Sender<Vec<i16>>,
    ) -> Self {
        let resampler = if device_sample_rate == CAPTURE_SAMPLE_RATE {
            None
        } else {
            FftFixedIn::new(
                device_sample_rate as usize,
                CAPTURE_SAMPLE_RATE as usize,
                1024,
                1,
                1,
            )
            .map_err(|e| warn!(error = %e, "failed to build resampler, passing audio through"))
            .ok()
        };

        Self {
            frame_samples,
            device_sample_rate,
            device_channels,
            resampler,
            carry: Vec::new(),
            frame_tx,
        }
    }

    fn push_f32(&mut self, data: &[f32]) {
        let mono = stereo_to_mono(data, self.device_channels);
        let resampled = match &mut self.resampler {
            Some(r) => resample_chunked(r, &mono),
            None if self.device_sample_rate == CAPTURE_SAMPLE_RATE => mono,
            None => mono, // resampler failed to build; best-effort passthrough
        };

        self.carry.extend(resampled);
        while self.carry.len() >= self.frame_samples {
            let frame: Vec<f32> = self.carry.drain(..self.frame_samples).collect();
            let pcm: Vec<i16> = frame.iter().map(|s| f32_to_i16(*s)).collect();
            if self.frame_tx.send(pcm).is_err() {
                // receiver gone; capture will be torn down shortly
                break;
            }
        }
    }
}

fn stereo_to_mono(data: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn resample_chunked(resampler: &mut FftFixedIn<f32>, input: &[f32]) -> Vec<f32> {
    let chunk_size = resampler.input_frames_next();
    let mut out = Vec::new();
    let mut offset = 0;
    while offset + chunk_size <= input.len() {
        let chunk = &input[offset..offset + chunk_size];
        if let Ok(mut result) = resampler.process(&[chunk], None) {
            out.append(&mut result.remove(0));
        }
        offset += chunk_size;
    }
    out
}

fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stereo_to_mono_averages_channels() {
        let stereo = vec![1.0, -1.0, 0.5, 0.5];
        assert_eq!(stereo_to_mono(&stereo, 2), vec![0.0, 0.5]);
    }

    #[test]
    fn f32_to_i16_clamps_range() {
        assert_eq!(f32_to_i16(2.0), i16::MAX);
        assert_eq!(f32_to_i16(-2.0), -(i16::MAX));
    }
}
