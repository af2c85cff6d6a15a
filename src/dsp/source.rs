//! Buffer playback source with playback-rate and detune control.
//!
//! Reads a buffer with linear-interpolation resampling. Rate and detune
//! combine multiplicatively, so detune shifts pitch and duration together
//! just like varispeed tape.

use super::buffer::{AudioBuffer, read_interpolated};

/// Convert a detune offset in cents to a frequency ratio.
pub fn cents_to_ratio(cents: f64) -> f64 {
    (2.0_f64).powf(cents / 1200.0)
}

/// A one-shot buffer player.
#[derive(Debug, Clone)]
pub struct BufferSource {
    /// Down-mixed mono samples.
    data: Vec<f32>,
    buffer_rate: u32,
    /// Playback rate multiplier (1.0 = original speed).
    pub playback_rate: f64,
    /// Detune in cents.
    pub detune: f64,
    /// Start offset in output frames; `None` means never started.
    start_frame: Option<usize>,
}

impl BufferSource {
    pub fn new(buffer: AudioBuffer, playback_rate: f64, detune: f64) -> Self {
        let buffer_rate = buffer.sample_rate();
        BufferSource {
            data: buffer.into_mono(),
            buffer_rate,
            playback_rate,
            detune,
            start_frame: None,
        }
    }

    /// Schedule playback to begin at `frame` of the output timeline.
    pub fn start(&mut self, frame: usize) {
        self.start_frame = Some(frame);
    }

    pub fn is_started(&self) -> bool {
        self.start_frame.is_some()
    }

    /// Source frames advanced per output frame.
    pub fn step(&self, output_rate: u32) -> f64 {
        let sr_ratio = if output_rate == 0 {
            1.0
        } else {
            self.buffer_rate as f64 / output_rate as f64
        };
        self.playback_rate * cents_to_ratio(self.detune) * sr_ratio
    }

    /// Render `frames` output frames at `output_rate`. Silent before the
    /// start offset, after the buffer runs out, or if never started.
    pub fn render(&self, frames: usize, output_rate: u32) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        let Some(start) = self.start_frame else {
            return out;
        };
        if self.data.is_empty() {
            return out;
        }

        let step = self.step(output_rate);
        let end = self.data.len() as f64;
        for (n, slot) in out.iter_mut().enumerate().skip(start) {
            let position = (n - start) as f64 * step;
            if position >= end {
                break;
            }
            *slot = read_interpolated(&self.data, position);
        }
        out
    }
}
