//! Error types for every stage of the mix pipeline.
//!
//! Each stage has its own enum so callers can tell a malformed voice buffer
//! apart from a render failure; all of them roll up into [`MixError`].

use thiserror::Error;

/// Top-level error returned by a mix call. A mix either fully succeeds or
/// fails with one of these; no partial output is ever returned.
#[derive(Debug, Error)]
pub enum MixError {
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("synthesis failed: {0}")]
    Synthesis(#[from] SynthesisError),
    #[error("render failed: {0}")]
    Render(#[from] RenderError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("parameter `{name}` out of range: {value} (expected 0..=100)")]
    InvalidParameter { name: &'static str, value: f32 },
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("byte length {len} is not a multiple of {frame_bytes} ({channels} channel(s) of 16-bit samples)")]
    MisalignedLength {
        len: usize,
        channels: u16,
        frame_bytes: usize,
    },
    #[error("channel count must be at least 1")]
    ZeroChannels,
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("duration {0}s does not produce any samples")]
    InvalidDuration(f64),
    #[error("unknown background layer '{0}'")]
    UnknownLayer(String),
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("node {0} does not belong to this graph")]
    UnknownNode(usize),
    #[error("node {0} is a source and cannot take inputs")]
    SourceInput(usize),
    #[error("node {0} is not a buffer source")]
    NotASource(usize),
    #[error("start time {0}s must be finite and non-negative")]
    InvalidStartTime(f64),
    #[error("graph contains a cycle through node {0}")]
    Cycle(usize),
    #[error("convolution kernel is empty")]
    EmptyKernel,
    #[error("buffer channels have unequal lengths ({expected} vs {found} frames)")]
    ChannelLength { expected: usize, found: usize },
    #[error("output of {requested:.2}s exceeds the {limit:.2}s render limit")]
    DurationLimit { requested: f64, limit: f64 },
    #[error("render task failed: {0}")]
    Join(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("`{field}` must be positive and finite, got {value}")]
    NotPositive { field: &'static str, value: f64 },
    #[error("`sampleRate` {value} exceeds the supported maximum of {max} Hz")]
    SampleRateTooHigh { value: u32, max: u32 },
}
