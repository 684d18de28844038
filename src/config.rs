use serde::{Deserialize, Serialize};

use crate::audio::pcm::{INPUT_SAMPLE_RATE, OUTPUT_SAMPLE_RATE};
use crate::error::ConfigError;

pub const DEFAULT_CAPTION_CHARS: usize = 60;
pub const DEFAULT_CAPTURE_FRAME_LEN: usize = 4096;
/// Highest rate any stage accepts.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Top-level configuration for batch rendering and live sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioConfig {
    /// Rate of synthesized PCM handed to the batch renderer.
    pub output_sample_rate: u32,
    pub subtitle: SubtitleConfig,
    pub live: LiveConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitleConfig {
    pub max_caption_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveConfig {
    /// Rate of outbound (captured) chunks.
    pub input_sample_rate: u32,
    /// Rate inbound chunks are interpreted at.
    pub output_sample_rate: u32,
    /// Samples per outbound frame.
    pub capture_frame_len: usize,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            subtitle: SubtitleConfig::default(),
            live: LiveConfig::default(),
        }
    }
}

impl Default for SubtitleConfig {
    fn default() -> Self {
        Self {
            max_caption_chars: DEFAULT_CAPTION_CHARS,
        }
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            input_sample_rate: INPUT_SAMPLE_RATE,
            output_sample_rate: OUTPUT_SAMPLE_RATE,
            capture_frame_len: DEFAULT_CAPTURE_FRAME_LEN,
        }
    }
}

impl LiveConfig {
    /// Tag declared on every outbound chunk.
    pub fn input_mime_type(&self) -> String {
        format!("audio/pcm;rate={}", self.input_sample_rate)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rate("live.input_sample_rate", self.input_sample_rate)?;
        check_rate("live.output_sample_rate", self.output_sample_rate)?;
        if self.capture_frame_len == 0 {
            return Err(invalid("live.capture_frame_len", "must be non-zero"));
        }
        Ok(())
    }
}

impl StudioConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_rate("output_sample_rate", self.output_sample_rate)?;
        if self.subtitle.max_caption_chars == 0 {
            return Err(invalid("subtitle.max_caption_chars", "must be non-zero"));
        }
        self.live.validate()
    }
}

fn check_rate(field: &'static str, rate: u32) -> Result<(), ConfigError> {
    if rate == 0 || rate > MAX_SAMPLE_RATE {
        return Err(invalid(field, &format!("must be between 1 and {} Hz", MAX_SAMPLE_RATE)));
    }
    Ok(())
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}
