//! Synthetic room impulse responses for convolution reverb.

use rand::Rng;
use tracing::debug;

use super::buffer::AudioBuffer;
use crate::error::SynthesisError;

/// Generate a mono impulse response: white noise under a `(1 - i/len)^decay`
/// envelope.
///
/// The noise comes from `rng`, so two renders only match when the caller
/// seeds the generator identically.
pub fn impulse_response<R: Rng + ?Sized>(
    sample_rate: u32,
    duration: f64,
    decay: f64,
    rng: &mut R,
) -> Result<AudioBuffer, SynthesisError> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(SynthesisError::InvalidDuration(duration));
    }
    let length = (sample_rate as f64 * duration) as usize;
    if length == 0 {
        return Err(SynthesisError::InvalidDuration(duration));
    }

    let data: Vec<f32> = (0..length)
        .map(|i| {
            let noise = rng.random::<f64>() * 2.0 - 1.0;
            let envelope = (1.0 - i as f64 / length as f64).powf(decay);
            (noise * envelope) as f32
        })
        .collect();

    debug!(length, decay, "synthesized impulse response");
    Ok(AudioBuffer::mono(data, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn length_and_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let ir = impulse_response(24000, 2.0, 2.0, &mut rng).unwrap();

        assert_eq!(ir.frames(), 48000);
        assert_eq!(ir.channel_count(), 1);
        assert!(ir.channel(0).unwrap().iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn envelope_decays() {
        let mut rng = StdRng::seed_from_u64(11);
        let ir = impulse_response(24000, 2.0, 2.0, &mut rng).unwrap();
        let data = ir.channel(0).unwrap();

        let rms = |s: &[f32]| (s.iter().map(|x| x * x).sum::<f32>() / s.len() as f32).sqrt();
        let head = rms(&data[..4800]);
        let tail = rms(&data[data.len() - 4800..]);
        assert!(head > 0.4, "head rms {head}");
        assert!(tail < 0.01, "tail rms {tail}");
    }

    #[test]
    fn seeded_generation_is_reproducible() {
        let a = impulse_response(8000, 0.5, 2.0, &mut StdRng::seed_from_u64(3)).unwrap();
        let b = impulse_response(8000, 0.5, 2.0, &mut StdRng::seed_from_u64(3)).unwrap();
        let c = impulse_response(8000, 0.5, 2.0, &mut StdRng::seed_from_u64(4)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_empty_duration() {
        let mut rng = StdRng::seed_from_u64(0);
        assert!(impulse_response(24000, 0.0, 2.0, &mut rng).is_err());
        assert!(impulse_response(24000, f64::NAN, 2.0, &mut rng).is_err());
        assert!(impulse_response(24000, 1e-6, 2.0, &mut rng).is_err());
    }
}
