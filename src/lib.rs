pub mod config;
pub mod dsp;
pub mod error;

pub use crate::config::MixConfig;
pub use crate::dsp::ambience::BackgroundLayer;
pub use crate::dsp::engine::{MixEngine, RenderedMix};
pub use crate::dsp::params::MixParameters;
pub use crate::dsp::renderer::{render_base64_wav, render_wav, render_wav_with_rng};
#[cfg(feature = "runtime")]
pub use crate::dsp::renderer::render_wav_async;
pub use crate::dsp::wav::WavBlob;
pub use crate::error::MixError;

use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the voicemix-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn params_from_js(params: JsValue) -> Result<Option<MixParameters>, JsValue> {
    if params.is_undefined() || params.is_null() {
        return Ok(None);
    }
    serde_wasm_bindgen::from_value(params)
        .map(Some)
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// Missing controls mean defaults; every control is clamped to 0..=100.
fn resolve_params(params: Option<MixParameters>) -> MixParameters {
    params.unwrap_or_default().clamped()
}

fn mix_pcm(voice_pcm: &[u8], layer: Option<&str>, params: Option<MixParameters>) -> Result<WavBlob, MixError> {
    let layer = BackgroundLayer::from(layer);
    render_wav(voice_pcm, &layer, &resolve_params(params), &MixConfig::default())
}

fn mix_pcm_base64(voice_pcm_b64: &str, layer: Option<&str>, params: Option<MixParameters>) -> Result<WavBlob, MixError> {
    let layer = BackgroundLayer::from(layer);
    render_base64_wav(voice_pcm_b64, &layer, &resolve_params(params), &MixConfig::default())
}

/// WASM-exposed: mix raw 24 kHz mono PCM bytes and return WAV bytes.
///
/// `params` is `{ reverbAmount, backgroundVolume, speed, pitch }`; missing
/// fields take their defaults and out-of-range values are clamped.
#[wasm_bindgen]
pub fn mix_voice_wav(voice_pcm: &[u8], layer: Option<String>, params: JsValue) -> Result<Vec<u8>, JsValue> {
    let params = params_from_js(params)?;
    mix_pcm(voice_pcm, layer.as_deref(), params)
        .map(WavBlob::into_bytes)
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: mix base64 PCM (as the speech provider returns it) and
/// return the WAV as base64, ready for a `data:audio/wav;base64,` URI.
#[wasm_bindgen]
pub fn mix_voice_base64(voice_pcm_b64: &str, layer: Option<String>, params: JsValue) -> Result<String, JsValue> {
    let params = params_from_js(params)?;
    mix_pcm_base64(voice_pcm_b64, layer.as_deref(), params)
        .map(|wav| wav.to_base64())
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}

/// WASM-exposed: the background selector catalog as `[{ id, name }]`.
#[wasm_bindgen]
pub fn background_layers() -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(&dsp::ambience::BACKGROUND_LAYERS[..])
        .map_err(|e| JsValue::from_str(&format!("{e}")))
}
