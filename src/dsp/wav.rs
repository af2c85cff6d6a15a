//! WAV container — 16-bit PCM encoding of an [`AudioBuffer`], plus a reader
//! for the canonical 44-byte header.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::buffer::AudioBuffer;

pub const WAV_MIME: &str = "audio/wav";
pub const HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;

/// A finished WAV file, ready for playback, download, or storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavBlob {
    bytes: Vec<u8>,
}

impl WavBlob {
    pub fn mime_type(&self) -> &'static str {
        WAV_MIME
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }

    /// `data:audio/wav;base64,...`, playable directly by a media element.
    pub fn to_data_uri(&self) -> String {
        format!("data:{WAV_MIME};base64,{}", self.to_base64())
    }

    /// Suggested file name for a download made at `timestamp_ms`.
    pub fn download_filename(timestamp_ms: u64) -> String {
        format!("voice_generation_{timestamp_ms}.wav")
    }

    pub fn header(&self) -> Option<WavHeader> {
        WavHeader::parse(&self.bytes)
    }
}

/// Quantize one normalized sample to i16. Negative values scale by 32768 and
/// non-negative by 32767, truncating toward zero.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode a buffer as a canonical 16-bit PCM WAV file.
///
/// Channels are interleaved frame by frame. An empty buffer yields a valid
/// file with an empty data chunk; a buffer without channels is written as
/// mono.
pub fn encode_wav(buffer: &AudioBuffer) -> WavBlob {
    let channels = u16::try_from(buffer.channel_count().max(1)).unwrap_or(u16::MAX);
    let sample_rate = buffer.sample_rate();
    let frames = if buffer.channel_count() == 0 { 0 } else { buffer.frames() };

    // Header fields saturate at their width.
    let block_align = channels.saturating_mul(BITS_PER_SAMPLE / 8);
    let byte_rate = sample_rate.saturating_mul(block_align as u32);
    let data_bytes = frames * buffer.channel_count() * 2;
    let data_size = u32::try_from(data_bytes).unwrap_or(u32::MAX);
    let file_size = data_size.saturating_add(36);

    let mut buf = Vec::with_capacity(HEADER_LEN + data_bytes);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for frame in 0..frames {
        for channel in buffer.channels() {
            buf.extend_from_slice(&quantize(channel[frame]).to_le_bytes());
        }
    }

    WavBlob { bytes: buf }
}

/// Fields of a canonical 44-byte WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavHeader {
    /// Read a canonical RIFF/WAVE/fmt/data header. Returns `None` for
    /// anything else (extra chunks, truncated input, wrong magic).
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN
            || &bytes[0..4] != b"RIFF"
            || &bytes[8..12] != b"WAVE"
            || &bytes[12..16] != b"fmt "
            || &bytes[36..40] != b"data"
        {
            return None;
        }
        let u16_at = |i: usize| u16::from_le_bytes([bytes[i], bytes[i + 1]]);
        let u32_at = |i: usize| u32::from_le_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);

        Some(WavHeader {
            audio_format: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_len: u32_at(40),
        })
    }

    /// Playback length in seconds.
    pub fn duration(&self) -> f64 {
        if self.byte_rate == 0 {
            return 0.0;
        }
        self.data_len as f64 / self.byte_rate as f64
    }
}
