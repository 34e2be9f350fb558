//! Plain configuration surface for the engine (§A.3).
//!
//! The on-disk format and its atomic-rewrite/backup persistence are an
//! external collaborator's concern; these structs are just the typed shape
//! that collaborator deserializes into and hands to [`crate::session_manager::SessionManager`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use voice_core::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub capture_sample_rate: u32,
    pub frame_samples: usize,
    pub playback_sample_rate: u32,
    pub playback_frame_duration_ms: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_sample_rate: 16_000,
            frame_samples: 480,
            playback_sample_rate: 22_050,
            playback_frame_duration_ms: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    pub t_normal: f32,
    pub t_bargein: f32,
    pub silence_duration_ms: u32,
    pub min_speech_ms: u32,
    pub pre_roll_ms: u32,
    pub model_path: Option<std::path::PathBuf>,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            t_normal: 0.5,
            t_bargein: 0.7,
            silence_duration_ms: 1_200,
            min_speech_ms: 500,
            pre_roll_ms: 200,
            model_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    pub binary_path: std::path::PathBuf,
    pub model_path: std::path::PathBuf,
    pub num_threads: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    pub binary_path: std::path::PathBuf,
    pub model_path: std::path::PathBuf,
    pub min_chunk_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JitterBufferConfig {
    pub buffer_size_ms: u32,
    pub low_watermark_ms: u32,
    pub frame_duration_ms: u32,
}

impl Default for JitterBufferConfig {
    fn default() -> Self {
        Self {
            buffer_size_ms: 500,
            low_watermark_ms: 100,
            frame_duration_ms: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    pub endpoint: String,
    #[serde(with = "duration_ms")]
    pub deadline: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:8765/chat".to_string(),
            deadline: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub barge_in_enabled: bool,
    #[serde(with = "duration_ms")]
    pub barge_in_cooldown: Duration,
    #[serde(with = "duration_ms")]
    pub connection_probe_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            barge_in_enabled: true,
            barge_in_cooldown: Duration::from_millis(200),
            connection_probe_interval: Duration::from_secs(5),
        }
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        #[allow(clippy::cast_possible_truncation)]
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

/// Top-level engine configuration. `stt`/`tts` have no `Default` impl on
/// purpose — model asset paths must come from the hosting collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub audio: AudioConfig,
    pub vad: VadConfig,
    pub stt: SttConfig,
    pub tts: TtsConfig,
    pub jitter: JitterBufferConfig,
    pub agent: AgentConfig,
    pub session: SessionConfig,
}

impl EngineConfig {
    /// The one documented cross-field constraint (spec.md's Open Questions):
    /// `t_bargein` must be strictly greater than `t_normal`.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.vad.t_bargein <= self.vad.t_normal {
            return Err(CoreError::ConfigInvalid(format!(
                "t_bargein ({}) must be greater than t_normal ({})",
                self.vad.t_bargein, self.vad.t_normal
            )));
        }
        if !(0.0..=1.0).contains(&self.vad.t_normal) || !(0.0..=1.0).contains(&self.vad.t_bargein) {
            return Err(CoreError::ConfigInvalid(
                "VAD thresholds must be in [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

/// Model asset locations, resolved and existence-checked by the hosting
/// collaborator before `SessionManager::new` is called. `vad` is optional —
/// the VAD classifier falls back to its built-in energy heuristic when no
/// model is configured.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub vad: Option<std::path::PathBuf>,
    pub stt_binary: std::path::PathBuf,
    pub stt_model: std::path::PathBuf,
    pub tts_binary: std::path::PathBuf,
    pub tts_model: std::path::PathBuf,
}

impl ModelPaths {
    /// Refuses to start if any configured asset is missing, naming the first
    /// one found absent (§6).
    pub fn check(&self) -> Result<(), CoreError> {
        if let Some(vad) = &self.vad {
            if !vad.exists() {
                return Err(CoreError::VadModelError(format!("{} does not exist", vad.display())));
            }
        }
        if !self.stt_binary.exists() {
            return Err(CoreError::SttBinaryNotFound(self.stt_binary.clone()));
        }
        if !self.stt_model.exists() {
            return Err(CoreError::ConfigMissing(format!(
                "STT model not found at {}",
                self.stt_model.display()
            )));
        }
        if !self.tts_binary.exists() {
            return Err(CoreError::TtsBinaryNotFound(self.tts_binary.clone()));
        }
        if !self.tts_model.exists() {
            return Err(CoreError::ConfigMissing(format!(
                "TTS model not found at {}",
                self.tts_model.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> EngineConfig {
        EngineConfig {
            audio: AudioConfig::default(),
            vad: VadConfig::default(),
            stt: SttConfig {
                binary_path: "whisper-cli".into(),
                model_path: "model.bin".into(),
                num_threads: 4,
            },
            tts: TtsConfig {
                binary_path: "piper".into(),
                model_path: "voice.onnx".into(),
                min_chunk_chars: 20,
            },
            jitter: JitterBufferConfig::default(),
            agent: AgentConfig::default(),
            session: SessionConfig::default(),
        }
    }

    #[test]
    fn default_thresholds_are_valid() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn bargein_not_greater_than_normal_is_rejected() {
        let mut cfg = base_config();
        cfg.vad.t_bargein = cfg.vad.t_normal;
        assert!(matches!(cfg.validate(), Err(CoreError::ConfigInvalid(_))));
    }
}
