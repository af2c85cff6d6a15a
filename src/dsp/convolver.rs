//! Convolution reverb — overlap-add FFT convolution with an impulse response.
//!
//! Kernels are normalized the way browser convolver nodes normalize them, so
//! a raw noise impulse response lands at a sensible wet level instead of
//! summing to many times full scale. The input is processed in blocks sized
//! to the kernel, so FFT memory stays proportional to the kernel rather than
//! to the render length.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

use super::buffer::AudioBuffer;
use crate::error::RenderError;

/// Calibration gain in dB applied on top of the RMS normalization.
const GAIN_CALIBRATION_DB: f64 = -58.0;
/// Rate the calibration was measured at.
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44100.0;
/// RMS floor so a near-silent kernel cannot blow up the scale.
const MIN_POWER: f64 = 0.000125;
/// Smallest input block, so tiny kernels do not degrade into per-sample FFTs.
const MIN_BLOCK: usize = 64;

/// A prepared convolution kernel.
#[derive(Debug, Clone)]
pub struct Convolver {
    kernel_len: usize,
    block: usize,
    /// Forward FFT of the zero-padded kernel, `fft_len(block, kernel_len)` bins.
    spectrum: Vec<Complex<f32>>,
    /// Linear gain applied to the convolved output.
    pub scale: f32,
}

impl Convolver {
    /// Prepare a normalized kernel from an impulse-response buffer.
    pub fn new(impulse: AudioBuffer) -> Result<Self, RenderError> {
        Self::with_normalize(impulse, true)
    }

    pub fn with_normalize(impulse: AudioBuffer, normalize: bool) -> Result<Self, RenderError> {
        if impulse.is_empty() || impulse.channel_count() == 0 {
            return Err(RenderError::EmptyKernel);
        }
        let scale = if normalize {
            normalization_scale(&impulse)
        } else {
            1.0
        };
        let kernel = impulse.into_mono();
        let block = block_size(kernel.len());
        Ok(Convolver {
            kernel_len: kernel.len(),
            block,
            spectrum: kernel_spectrum(&kernel, fft_len(block, kernel.len())),
            scale,
        })
    }

    pub fn kernel_len(&self) -> usize {
        self.kernel_len
    }

    /// Input samples per FFT block.
    pub fn block_len(&self) -> usize {
        self.block
    }

    /// Convolve `input` with the kernel and return the first `frames` samples.
    pub fn process(&self, input: &[f32], frames: usize) -> Vec<f32> {
        let mut out = overlap_add(input, &self.spectrum, self.block, frames);
        if self.scale != 1.0 {
            out.iter_mut().for_each(|s| *s *= self.scale);
        }
        out
    }
}

/// `1 / rms` with the browser's -58 dB calibration and sample-rate scaling.
pub fn normalization_scale(impulse: &AudioBuffer) -> f32 {
    let count = impulse.channel_count() * impulse.frames();
    if count == 0 {
        return 1.0;
    }
    let mut power = (impulse.energy() / count as f64).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    let mut scale = 1.0 / power;
    scale *= 10.0_f64.powf(GAIN_CALIBRATION_DB * 0.05);
    if impulse.sample_rate() > 0 {
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / impulse.sample_rate() as f64;
    }
    if impulse.channel_count() == 4 {
        scale *= 0.5;
    }
    scale as f32
}

/// Full linear convolution. Output length is `signal.len() + kernel.len() - 1`.
pub fn fft_convolve(signal: &[f32], kernel: &[f32]) -> Vec<f32> {
    block_convolve(signal, kernel, block_size(kernel.len()))
}

/// Full linear convolution, overlap-adding `block`-sample input chunks.
pub fn block_convolve(signal: &[f32], kernel: &[f32], block: usize) -> Vec<f32> {
    if signal.is_empty() || kernel.is_empty() {
        return Vec::new();
    }
    let block = block.max(1);
    let spectrum = kernel_spectrum(kernel, fft_len(block, kernel.len()));
    overlap_add(signal, &spectrum, block, signal.len() + kernel.len() - 1)
}

fn block_size(kernel_len: usize) -> usize {
    kernel_len.next_power_of_two().max(MIN_BLOCK)
}

/// FFT size that holds one block convolved with the whole kernel.
fn fft_len(block: usize, kernel_len: usize) -> usize {
    (block + kernel_len - 1).next_power_of_two()
}

fn kernel_spectrum(kernel: &[f32], size: usize) -> Vec<Complex<f32>> {
    let mut spectrum: Vec<Complex<f32>> = kernel.iter().map(|&k| Complex::new(k, 0.0)).collect();
    spectrum.resize(size, Complex::new(0.0, 0.0));
    FftPlanner::<f32>::new().plan_fft_forward(size).process(&mut spectrum);
    spectrum
}

/// Convolve `signal` with a precomputed kernel spectrum, writing exactly
/// `out_len` samples. Input past `out_len` cannot reach the output and is
/// skipped, as are silent blocks.
fn overlap_add(signal: &[f32], spectrum: &[Complex<f32>], block: usize, out_len: usize) -> Vec<f32> {
    let size = spectrum.len();
    let mut out = vec![0.0f32; out_len];
    if size == 0 {
        return out;
    }

    let mut planner = FftPlanner::<f32>::new();
    let forward = planner.plan_fft_forward(size);
    let inverse = planner.plan_fft_inverse(size);
    let scratch_len = forward
        .get_inplace_scratch_len()
        .max(inverse.get_inplace_scratch_len());
    let mut scratch = vec![Complex::new(0.0, 0.0); scratch_len];
    let mut buf = vec![Complex::new(0.0, 0.0); size];
    let norm = 1.0 / size as f32;

    let usable = signal.len().min(out_len);
    for start in (0..usable).step_by(block) {
        let chunk = &signal[start..(start + block).min(usable)];
        if chunk.iter().all(|&s| s == 0.0) {
            continue;
        }
        for (slot, &s) in buf.iter_mut().zip(chunk) {
            *slot = Complex::new(s, 0.0);
        }
        buf[chunk.len()..].fill(Complex::new(0.0, 0.0));

        forward.process_with_scratch(&mut buf, &mut scratch);
        for (x, y) in buf.iter_mut().zip(spectrum) {
            *x *= *y;
        }
        inverse.process_with_scratch(&mut buf, &mut scratch);

        for (o, c) in out[start..].iter_mut().zip(&buf) {
            *o += c.re * norm;
        }
    }
    out
}
