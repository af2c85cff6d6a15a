//! PCM decoder — raw 16-bit little-endian speech bytes to an [`AudioBuffer`].
//!
//! The speech provider hands back headerless PCM at a fixed rate. Nothing here
//! resamples: the declared sample rate is trusted as-is.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::debug;

use super::buffer::AudioBuffer;
use crate::error::DecodeError;

/// Full-scale divisor for signed 16-bit samples.
const I16_SCALE: f32 = 32768.0;

/// Decode interleaved 16-bit signed LE PCM into planar f32 channels.
///
/// Byte lengths that do not cover a whole number of frames are rejected
/// rather than truncated.
pub fn decode_pcm16(bytes: &[u8], sample_rate: u32, channels: u16) -> Result<AudioBuffer, DecodeError> {
    if channels == 0 {
        return Err(DecodeError::ZeroChannels);
    }
    if sample_rate == 0 {
        return Err(DecodeError::ZeroSampleRate);
    }

    let channel_count = channels as usize;
    let frame_bytes = 2 * channel_count;
    if bytes.len() % frame_bytes != 0 {
        return Err(DecodeError::MisalignedLength {
            len: bytes.len(),
            channels,
            frame_bytes,
        });
    }

    let frames = bytes.len() / frame_bytes;
    let mut planar = vec![Vec::with_capacity(frames); channel_count];
    for frame in bytes.chunks_exact(frame_bytes) {
        for (channel, sample) in planar.iter_mut().zip(frame.chunks_exact(2)) {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            channel.push(value as f32 / I16_SCALE);
        }
    }

    debug!(frames, channels, sample_rate, "decoded pcm16");
    Ok(AudioBuffer::from_equal_channels(planar, sample_rate))
}

/// Decode base64-wrapped PCM, the form the speech provider transmits.
pub fn decode_base64_pcm(text: &str, sample_rate: u32, channels: u16) -> Result<AudioBuffer, DecodeError> {
    let bytes = STANDARD.decode(text.trim())?;
    decode_pcm16(&bytes, sample_rate, channels)
}
