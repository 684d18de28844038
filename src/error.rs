use thiserror::Error;

use crate::live::state::SessionState;

/// Failures while decoding or moving audio in and out of the process.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("invalid base64 audio payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("failed to read wav input: {0}")]
    Wav(#[from] hound::Error),

    #[error("unsupported wav layout: {channels} channel(s), {bits} bit")]
    UnsupportedWav { channels: u16, bits: u16 },

    #[error("audio device unavailable: {0}")]
    Device(String),

    #[error("resampler setup failed: {0}")]
    Resample(String),
}

/// Lifecycle failures of a live session. Every variant is recoverable by
/// discarding the session and building a new one.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("cannot {op} a session in state {from:?}")]
    InvalidTransition { from: SessionState, op: &'static str },

    #[error("microphone capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error("audio playback unavailable: {0}")]
    PlaybackUnavailable(String),

    #[error("remote channel refused to open: {0}")]
    ChannelRefused(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
