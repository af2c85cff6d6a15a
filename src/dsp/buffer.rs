//! Planar floating-point audio buffer shared by every pipeline stage.

use crate::error::RenderError;

/// A fixed-rate, multi-channel block of normalized f32 samples.
///
/// All channels hold the same number of frames. Stages never share a buffer:
/// each one produces a fresh `AudioBuffer` and moves it to the next stage.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Create a silent buffer with `channel_count` channels of `frames` frames.
    pub fn silent(channel_count: usize, frames: usize, sample_rate: u32) -> Self {
        AudioBuffer {
            sample_rate,
            channels: vec![vec![0.0; frames]; channel_count],
        }
    }

    /// Wrap a single channel of samples.
    pub fn mono(data: Vec<f32>, sample_rate: u32) -> Self {
        AudioBuffer {
            sample_rate,
            channels: vec![data],
        }
    }

    /// Build from planar channel data, rejecting channels of unequal length.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, RenderError> {
        if let Some(first) = channels.first() {
            let expected = first.len();
            if let Some(bad) = channels.iter().find(|c| c.len() != expected) {
                return Err(RenderError::ChannelLength {
                    expected,
                    found: bad.len(),
                });
            }
        }
        Ok(AudioBuffer {
            sample_rate,
            channels,
        })
    }

    /// Callers guarantee equal channel lengths (every frame fills every channel).
    pub(crate) fn from_equal_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        debug_assert!(channels.windows(2).all(|w| w[0].len() == w[1].len()));
        AudioBuffer {
            sample_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / self.sample_rate as f64
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Average all channels into one. Mono buffers are returned as-is.
    pub fn into_mono(self) -> Vec<f32> {
        let count = self.channels.len();
        let mut channels = self.channels.into_iter();
        let Some(mut mixed) = channels.next() else {
            return Vec::new();
        };
        if count == 1 {
            return mixed;
        }
        for channel in channels {
            for (out, s) in mixed.iter_mut().zip(channel) {
                *out += s;
            }
        }
        let scale = 1.0 / count as f32;
        mixed.iter_mut().for_each(|s| *s *= scale);
        mixed
    }

    /// Sum of squared samples across all channels.
    pub fn energy(&self) -> f64 {
        self.channels
            .iter()
            .flatten()
            .map(|&s| (s as f64) * (s as f64))
            .sum()
    }

    /// Read channel 0 at a fractional frame position with linear
    /// interpolation. Positions outside the buffer read as silence.
    pub fn read_interpolated(&self, position: f64) -> f32 {
        let Some(data) = self.channels.first() else {
            return 0.0;
        };
        read_interpolated(data, position)
    }
}

pub(crate) fn read_interpolated(data: &[f32], position: f64) -> f32 {
    if data.is_empty() || position < 0.0 {
        return 0.0;
    }

    let idx = position as usize;
    if idx >= data.len() - 1 {
        return if idx < data.len() { data[idx] } else { 0.0 };
    }

    let frac = (position - idx as f64) as f32;
    data[idx] * (1.0 - frac) + data[idx + 1] * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_ragged_channels() {
        let err = AudioBuffer::from_channels(vec![vec![0.0; 4], vec![0.0; 3]], 24000);
        assert!(matches!(
            err,
            Err(RenderError::ChannelLength { expected: 4, found: 3 })
        ));
    }

    #[test]
    fn duration_from_frames() {
        let buf = AudioBuffer::silent(1, 48000, 24000);
        assert_eq!(buf.frames(), 48000);
        assert!((buf.duration() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn zero_channel_buffer_is_empty() {
        let buf = AudioBuffer::from_channels(Vec::new(), 24000).unwrap();
        assert_eq!(buf.channel_count(), 0);
        assert!(buf.is_empty());
        assert_eq!(buf.duration(), 0.0);
    }

    #[test]
    fn interpolation() {
        let buf = AudioBuffer::mono(vec![0.0, 1.0, 0.0, -1.0], 24000);

        assert!((buf.read_interpolated(0.0) - 0.0).abs() < 0.001);
        assert!((buf.read_interpolated(0.5) - 0.5).abs() < 0.001);
        assert!((buf.read_interpolated(1.0) - 1.0).abs() < 0.001);
        assert!((buf.read_interpolated(2.5) + 0.5).abs() < 0.001);
        assert_eq!(buf.read_interpolated(4.0), 0.0);
        assert_eq!(buf.read_interpolated(-1.0), 0.0);
    }

    #[test]
    fn stereo_downmix_averages() {
        let buf = AudioBuffer::from_channels(vec![vec![1.0, 0.0], vec![0.0, -1.0]], 24000).unwrap();
        assert_eq!(buf.into_mono(), vec![0.5, -0.5]);
    }
}
