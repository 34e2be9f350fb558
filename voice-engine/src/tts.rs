//! TTS Synthesizer (C6).
//!
//! Streams PCM for a text input sentence-by-sentence by invoking an
//! out-of-process synthesis binary once per sentence, in order, with no
//! barrier between sentences — each sentence's PCM is handed to the caller
//! (C7) as soon as it is ready.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::AsyncWriteExt as _;
use tokio::process::Command;
use tracing::warn;
use voice_core::{CoreError, PlaybackChunk};

use crate::config::TtsConfig;
use crate::text_utils::split_into_sentences;

pub const TTS_SAMPLE_RATE: u32 = 22_050;

#[derive(Debug, Clone)]
pub enum TtsEvent {
    SpeakStarted { text: String },
    SentenceStarted { index: usize, sentence: String, total: usize },
    SentenceComplete { index: usize },
    SpeakComplete,
    SpeakStopped,
}

pub struct TtsEngine {
    binary_path: PathBuf,
    model_path: PathBuf,
    min_chunk_chars: usize,
}

impl TtsEngine {
    pub fn new(config: &TtsConfig) -> Result<Self, CoreError> {
        if !config.binary_path.exists() {
            return Err(CoreError::TtsBinaryNotFound(config.binary_path.clone()));
        }
        if !config.model_path.exists() {
            return Err(CoreError::ConfigMissing(format!(
                "TTS model not found at {}",
                config.model_path.display()
            )));
        }
        Ok(Self {
            binary_path: config.binary_path.clone(),
            model_path: config.model_path.clone(),
            min_chunk_chars: config.min_chunk_chars,
        })
    }

    /// Synthesize `text` sentence-by-sentence, invoking `on_chunk` for each
    /// sentence's PCM and `on_event` for lifecycle events. `cancel` is
    /// polled between sentences so `stop()` can cut synthesis short without
    /// flushing further PCM (§4.6).
    pub async fn speak(
        &self,
        text: &str,
        cancel: &AtomicBool,
        mut on_chunk: impl FnMut(PlaybackChunk),
        mut on_event: impl FnMut(TtsEvent),
    ) -> Result<(), CoreError> {
        let sentences = split_into_sentences(text, self.min_chunk_chars);
        let total = sentences.len();
        on_event(TtsEvent::SpeakStarted {
            text: text.to_string(),
        });

        for (index, sentence) in sentences.into_iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                on_event(TtsEvent::SpeakStopped);
                return Ok(());
            }

            on_event(TtsEvent::SentenceStarted {
                index,
                sentence: sentence.clone(),
                total,
            });

            let chunk = self.synthesize_sentence(&sentence).await?;

            if cancel.load(Ordering::Relaxed) {
                on_event(TtsEvent::SpeakStopped);
                return Ok(());
            }

            on_chunk(chunk);
            on_event(TtsEvent::SentenceComplete { index });
        }

        on_event(TtsEvent::SpeakComplete);
        Ok(())
    }

    async fn synthesize_sentence(&self, sentence: &str) -> Result<PlaybackChunk, CoreError> {
        let out_file = tempfile::NamedTempFile::new()
            .map_err(|e| CoreError::TtsProcessError(format!("failed to stage WAV output: {e}")))?;

        let mut child = Command::new(&self.binary_path)
            .arg("-m")
            .arg(&self.model_path)
            .arg("--output_file")
            .arg(out_file.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| CoreError::TtsProcessError(format!("failed to spawn TTS binary: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(sentence.as_bytes())
                .await
                .map_err(|e| CoreError::TtsProcessError(format!("failed to write input: {e}")))?;
            drop(stdin);
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| CoreError::TtsProcessError(format!("failed waiting on TTS binary: {e}")))?;

        if !output.status.success() {
            warn!(
                code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "TTS subprocess exited non-zero"
            );
            return Err(CoreError::TtsFailed(format!(
                "TTS binary exited with {:?}",
                output.status.code()
            )));
        }

        read_wav(out_file.path())
    }
}

fn read_wav(path: &std::path::Path) -> Result<PlaybackChunk, CoreError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| CoreError::TtsProcessError(format!("failed to read synthesized WAV: {e}")))?;
    let sample_rate = reader.spec().sample_rate;
    let samples: Vec<i16> = reader
        .samples::<i16>()
        .collect::<Result<_, _>>()
        .map_err(|e| CoreError::TtsProcessError(format!("corrupt synthesized WAV: {e}")))?;
    Ok(PlaybackChunk {
        samples,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tts_sample_rate_default_matches_spec() {
        assert_eq!(TTS_SAMPLE_RATE, 22_050);
    }
}
