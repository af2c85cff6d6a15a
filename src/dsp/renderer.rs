//! One-call renderers — raw speech PCM in, finished WAV out.
//!
//! These are the entry points an application calls. Controls are clamped to
//! 0..=100 here, on the caller's side of the engine.

use rand::Rng;

use super::ambience::BackgroundLayer;
use super::decoder::decode_base64_pcm;
use super::engine::MixEngine;
use super::params::MixParameters;
use super::wav::WavBlob;
use crate::config::MixConfig;
use crate::error::MixError;

/// Mix and encode with the config's generator (OS entropy unless seeded).
pub fn render_wav(
    voice_pcm: &[u8],
    layer: &BackgroundLayer,
    params: &MixParameters,
    config: &MixConfig,
) -> Result<WavBlob, MixError> {
    let mut rng = config.rng();
    render_wav_with_rng(voice_pcm, layer, params, config, &mut rng)
}

/// Mix and encode, drawing all noise from `rng`.
pub fn render_wav_with_rng<R: Rng + ?Sized>(
    voice_pcm: &[u8],
    layer: &BackgroundLayer,
    params: &MixParameters,
    config: &MixConfig,
    rng: &mut R,
) -> Result<WavBlob, MixError> {
    let engine = MixEngine::new(config.clone())?;
    let mix = engine.mix(voice_pcm, layer, &params.clamped(), rng)?;
    Ok(mix.to_wav())
}

/// Mix base64-wrapped PCM, the form the speech provider returns.
pub fn render_base64_wav(
    voice_pcm_b64: &str,
    layer: &BackgroundLayer,
    params: &MixParameters,
    config: &MixConfig,
) -> Result<WavBlob, MixError> {
    let engine = MixEngine::new(config.clone())?;
    let voice = decode_base64_pcm(voice_pcm_b64, config.sample_rate, 1)?;
    let mut rng = config.rng();
    let mix = engine.mix_buffer(voice, layer, &params.clamped(), &mut rng)?;
    Ok(mix.to_wav())
}

/// Render on tokio's blocking pool so async callers are not stalled by the
/// full-buffer computation.
#[cfg(feature = "runtime")]
pub async fn render_wav_async(
    voice_pcm: Vec<u8>,
    layer: BackgroundLayer,
    params: MixParameters,
    config: MixConfig,
) -> Result<WavBlob, MixError> {
    tokio::task::spawn_blocking(move || render_wav(&voice_pcm, &layer, &params, &config))
        .await
        .map_err(|e| crate::error::RenderError::Join(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::io::Cursor;

    fn voice(seconds: f64) -> Vec<u8> {
        let len = (seconds * 24000.0) as usize;
        (0..len)
            .map(|i| ((i as f32 * 0.06).sin() * 12000.0) as i16)
            .flat_map(|s| s.to_le_bytes())
            .collect()
    }

    fn wav_seconds(wav: &WavBlob) -> f64 {
        let reader = hound::WavReader::new(Cursor::new(wav.as_bytes().to_vec())).unwrap();
        reader.duration() as f64 / reader.spec().sample_rate as f64
    }

    #[test]
    fn two_second_voice_renders_four_seconds() {
        let wav = render_wav(&voice(2.0), &BackgroundLayer::None, &MixParameters::dry(), &MixConfig::default()).unwrap();

        let reader = hound::WavReader::new(Cursor::new(wav.as_bytes().to_vec())).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 24000);
        assert_eq!(spec.bits_per_sample, 16);
        assert!((wav_seconds(&wav) - 4.0).abs() < 1e-3);
    }

    #[test]
    fn fastest_speed_renders_three_and_a_third_seconds() {
        let params = MixParameters { speed: 100.0, ..MixParameters::dry() };
        let wav = render_wav(&voice(2.0), &BackgroundLayer::None, &params, &MixConfig::default()).unwrap();
        assert!((wav_seconds(&wav) - (2.0 / 1.5 + 2.0)).abs() < 1e-3);
    }

    #[test]
    fn out_of_range_controls_are_clamped() {
        let wild = MixParameters { speed: 400.0, pitch: -30.0, reverb_amount: 0.0, background_volume: 0.0 };
        let tame = MixParameters { speed: 100.0, pitch: 0.0, ..MixParameters::dry() };
        let config = MixConfig::default();

        let a = render_wav_with_rng(&voice(0.5), &BackgroundLayer::None, &wild, &config, &mut StdRng::seed_from_u64(1)).unwrap();
        let b = render_wav_with_rng(&voice(0.5), &BackgroundLayer::None, &tame, &config, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn seeded_config_is_reproducible() {
        let config = MixConfig::default().with_seed(77);
        let params = MixParameters { reverb_amount: 50.0, background_volume: 60.0, ..MixParameters::dry() };
        let a = render_wav(&voice(0.5), &BackgroundLayer::Rain, &params, &config).unwrap();
        let b = render_wav(&voice(0.5), &BackgroundLayer::Rain, &params, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn base64_input_matches_raw_input() {
        use base64::Engine as _;
        let config = MixConfig::default().with_seed(12);
        let params = MixParameters { reverb_amount: 25.0, background_volume: 20.0, ..MixParameters::dry() };
        let pcm = voice(0.5);
        let encoded = base64::engine::general_purpose::STANDARD.encode(&pcm);

        let from_raw = render_wav(&pcm, &BackgroundLayer::Fire, &params, &config).unwrap();
        let from_b64 = render_base64_wav(&encoded, &BackgroundLayer::Fire, &params, &config).unwrap();
        assert_eq!(from_raw, from_b64);

        let err = render_base64_wav("@@@", &BackgroundLayer::None, &params, &config).unwrap_err();
        assert!(matches!(err, MixError::Decode(_)));
    }

    #[test]
    fn invalid_config_is_reported() {
        let config = MixConfig { impulse_duration: 0.0, ..MixConfig::default() };
        let err = render_wav(&voice(0.1), &BackgroundLayer::None, &MixParameters::dry(), &config).unwrap_err();
        assert!(matches!(err, MixError::Config(_)));
    }

    #[cfg(feature = "runtime")]
    #[tokio::test]
    async fn async_render_matches_sync() {
        let config = MixConfig::default().with_seed(3);
        let params = MixParameters { reverb_amount: 30.0, background_volume: 40.0, ..MixParameters::dry() };
        let layer = BackgroundLayer::Night;

        let sync = render_wav(&voice(0.5), &layer, &params, &config).unwrap();
        let async_ = render_wav_async(voice(0.5), layer, params, config).await.unwrap();
        assert_eq!(sync, async_);
    }
}
