//! STT Engine (C5).
//!
//! Transcribes a captured utterance by invoking an out-of-process inference
//! binary with a model path and a thread count (§4.5, §9). The utterance is
//! serialized as a WAV container and handed to the subprocess on the
//! filesystem; there are no retries — a process failure is fatal for that
//! single call.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::process::Command;
use tracing::{debug, warn};
use voice_core::{CoreError, Transcript, Utterance};

use crate::config::SttConfig;

/// The frozen no-speech garbage set (SPEC_FULL §7). Matched
/// case-insensitively after trimming surrounding whitespace and punctuation.
const GARBAGE_TRANSCRIPTS: &[&str] = &[
    "",
    "[blank_audio]",
    "[music]",
    "[noise]",
    "[sound]",
    "(silence)",
    "(blank audio)",
    "[inaudible]",
];

/// The distinct outcomes of a single `transcribe` call, matching §4.4's
/// requirement that empty/garbage transcripts are a distinct event from a
/// real transcript, not an error.
#[derive(Debug, Clone)]
pub enum SttOutcome {
    Transcript(Transcript),
    Empty,
}

pub struct SttEngine {
    binary_path: PathBuf,
    model_path: PathBuf,
    num_threads: u32,
}

impl SttEngine {
    pub fn new(config: &SttConfig) -> Result<Self, CoreError> {
        if !config.binary_path.exists() {
            return Err(CoreError::SttBinaryNotFound(config.binary_path.clone()));
        }
        if !config.model_path.exists() {
            return Err(CoreError::ConfigMissing(format!(
                "STT model not found at {}",
                config.model_path.display()
            )));
        }
        Ok(Self {
            binary_path: config.binary_path.clone(),
            model_path: config.model_path.clone(),
            num_threads: config.num_threads,
        })
    }

    /// Transcribe one utterance. No retries: a subprocess failure is
    /// reported as `CoreError::SttProcessError` and the caller must not
    /// retry internally.
    pub async fn transcribe(&self, utterance: &Utterance) -> Result<SttOutcome, CoreError> {
        let wav_file = write_wav_tempfile(&utterance.samples)
            .map_err(|e| CoreError::SttProcessError(format!("failed to stage WAV input: {e}")))?;

        let start = Instant::now();
        let output = Command::new(&self.binary_path)
            .arg("-m")
            .arg(&self.model_path)
            .arg("-t")
            .arg(self.num_threads.to_string())
            .arg("-f")
            .arg(wav_file.path())
            .output()
            .await
            .map_err(|e| CoreError::SttProcessError(format!("failed to spawn STT binary: {e}")))?;

        let stt_duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

        if !output.status.success() {
            warn!(
                code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "STT subprocess exited non-zero"
            );
            return Err(CoreError::SttProcessError(format!(
                "STT binary exited with {:?}",
                output.status.code()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();

        if is_garbage_transcript(&text) {
            debug!(text = %text, "transcript matched garbage set");
            return Ok(SttOutcome::Empty);
        }

        Ok(SttOutcome::Transcript(Transcript {
            text,
            audio_duration_ms: utterance.duration_ms,
            stt_duration_ms,
        }))
    }
}

fn is_garbage_transcript(text: &str) -> bool {
    let normalized = text.trim().trim_matches(|c: char| c.is_ascii_punctuation());
    GARBAGE_TRANSCRIPTS
        .iter()
        .any(|g| normalized.eq_ignore_ascii_case(g))
}

fn write_wav_tempfile(samples: &[i16]) -> std::io::Result<tempfile::NamedTempFile> {
    let file = tempfile::NamedTempFile::new()?;
    write_wav(file.path(), samples)?;
    Ok(file)
}

fn write_wav(path: &Path, samples: &[i16]) -> std::io::Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    for sample in samples {
        writer
            .write_sample(*sample)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
    }
    writer
        .finalize()
        .map_err(|e| std::io::Error::other(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_set_matches_case_and_punctuation_insensitively() {
        assert!(is_garbage_transcript(""));
        assert!(is_garbage_transcript("  "));
        assert!(is_garbage_transcript("[BLANK_AUDIO]"));
        assert!(is_garbage_transcript("[Music]"));
        assert!(is_garbage_transcript("(Silence)"));
        assert!(!is_garbage_transcript("Hello there"));
    }

    #[test]
    fn wav_roundtrip_preserves_sample_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        let samples = vec![100i16, -100, 200, -200];
        write_wav(&path, &samples).unwrap();
        let mut reader = hound::WavReader::open(&path).unwrap();
        let read: Vec<i16> = reader.samples::<i16>().map(Result::unwrap).collect();
        assert_eq!(read, samples);
    }
}
