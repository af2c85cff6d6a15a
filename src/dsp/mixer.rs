//! Mixer — sums whole signals into one bus with a linear gain.

/// A summing bus. Gain nodes and the graph destination are both mixers.
#[derive(Debug, Clone)]
pub struct Mixer {
    pub gain: f32,
    buffer: Vec<f32>,
}

impl Mixer {
    pub fn new(gain: f32) -> Self {
        Mixer {
            gain,
            buffer: Vec::new(),
        }
    }

    /// A bus that already holds `buffer`.
    pub fn from_buffer(gain: f32, buffer: Vec<f32>) -> Self {
        Mixer { gain, buffer }
    }

    /// Prepare a buffer of `num_samples` filled with zeros.
    pub fn clear(&mut self, num_samples: usize) {
        self.buffer.clear();
        self.buffer.resize(num_samples, 0.0);
    }

    /// Accumulate a signal starting at frame 0. Samples beyond the bus
    /// length are dropped.
    pub fn add_signal(&mut self, signal: &[f32]) {
        for (out, &s) in self.buffer.iter_mut().zip(signal) {
            *out += s;
        }
    }

    /// Take the mixed buffer with gain applied. No clipping happens here;
    /// out-of-range peaks are clamped at encode time.
    pub fn output(self) -> Vec<f32> {
        let gain = self.gain;
        let mut buffer = self.buffer;
        if gain != 1.0 {
            buffer.iter_mut().for_each(|s| *s *= gain);
        }
        buffer
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
