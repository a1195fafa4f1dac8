//! Configuration types for pipeline composition.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for a pipeline instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Stage adapter settings (keep-alive cadence, sentence splitting).
    pub stage: StageConfig,
    /// Channel settings (queue polling cadence).
    pub channel: ChannelConfig,
    /// Audio framing settings.
    pub audio: AudioConfig,
}

/// Settings shared by the stage adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Seconds between keep-alive pings on an open transport.
    pub keepalive_interval_secs: u64,
    /// Characters that terminate a sentence when chunking LLM tokens.
    pub sentence_terminators: String,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            keepalive_interval_secs: 3,
            sentence_terminators: ".?!".to_owned(),
        }
    }
}

impl StageConfig {
    /// Keep-alive cadence as a [`Duration`].
    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_secs(self.keepalive_interval_secs)
    }
}

/// Settings for queue-backed channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Milliseconds between polls when waiting on an empty queue.
    ///
    /// Bounds how eagerly the queue stream adapter re-checks the buffer;
    /// it never spins unyieldingly.
    pub queue_poll_interval_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            queue_poll_interval_ms: 10,
        }
    }
}

impl ChannelConfig {
    /// Queue polling cadence as a [`Duration`].
    pub fn queue_poll_interval(&self) -> Duration {
        Duration::from_millis(self.queue_poll_interval_ms)
    }
}

/// Audio framing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Sample rate in Hz for captured audio.
    pub sample_rate: u32,
    /// Frames per captured chunk.
    pub chunk_frames: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            chunk_frames: 512,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| PipelineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PipelineConfig::default();
        assert_eq!(config.stage.keepalive_interval(), Duration::from_secs(3));
        assert_eq!(
            config.channel.queue_poll_interval(),
            Duration::from_millis(10)
        );
        assert_eq!(config.audio.sample_rate, 16_000);
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [stage]
            keepalive_interval_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.stage.keepalive_interval_secs, 5);
        assert_eq!(config.stage.sentence_terminators, ".?!");
        assert_eq!(config.channel.queue_poll_interval_ms, 10);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxkit.toml");
        std::fs::write(&path, "[audio]\nsample_rate = 48000\n").unwrap();
        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.audio.sample_rate, 48_000);
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxkit.toml");
        std::fs::write(&path, "not toml [").unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(PipelineError::Config(_))
        ));
    }
}
