//! Procedural ambient backgrounds — rain, night, fire crackle, plain noise.
//!
//! Everything is synthesized from noise; no audio assets are loaded.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use serde::Serialize;
use tracing::debug;

use super::buffer::AudioBuffer;
use crate::error::SynthesisError;

/// Which ambience to lay under the voice.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BackgroundLayer {
    #[default]
    None,
    Rain,
    Fire,
    Night,
    /// Any other catalog id. Rendered as unshaped white noise.
    Other(String),
}

impl BackgroundLayer {
    pub fn id(&self) -> &str {
        match self {
            BackgroundLayer::None => "none",
            BackgroundLayer::Rain => "rain",
            BackgroundLayer::Fire => "fire",
            BackgroundLayer::Night => "night",
            BackgroundLayer::Other(id) => id,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, BackgroundLayer::None)
    }

    /// True for layers with a dedicated synthesis recipe.
    pub fn is_shaped(&self) -> bool {
        matches!(
            self,
            BackgroundLayer::Rain | BackgroundLayer::Fire | BackgroundLayer::Night
        )
    }
}

impl FromStr for BackgroundLayer {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim() {
            "" | "none" => BackgroundLayer::None,
            "rain" => BackgroundLayer::Rain,
            "fire" => BackgroundLayer::Fire,
            "night" => BackgroundLayer::Night,
            other => BackgroundLayer::Other(other.to_string()),
        })
    }
}

impl From<Option<&str>> for BackgroundLayer {
    fn from(id: Option<&str>) -> Self {
        match id {
            Some(id) => id.parse().unwrap_or_default(),
            None => BackgroundLayer::None,
        }
    }
}

impl fmt::Display for BackgroundLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ── Catalog ─────────────────────────────────────────────────

/// An entry in the background selector shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LayerInfo {
    pub id: &'static str,
    pub name: &'static str,
}

/// Every background the product offers, in display order.
pub const BACKGROUND_LAYERS: [LayerInfo; 14] = [
    LayerInfo { id: "none", name: "None" },
    LayerInfo { id: "rain", name: "Soft Rain" },
    LayerInfo { id: "fire", name: "Fire Crackling" },
    LayerInfo { id: "horror-ambience", name: "Horror Ambience" },
    LayerInfo { id: "studio-reverb", name: "Studio Reverb" },
    LayerInfo { id: "night", name: "Night Ambience" },
    LayerInfo { id: "quranic-echo", name: "Quranic Echo Hall" },
    LayerInfo { id: "battle", name: "Battle Scene" },
    LayerInfo { id: "crowd", name: "Crowd Noise" },
    LayerInfo { id: "heartbeat", name: "Heartbeat" },
    LayerInfo { id: "horror-drone", name: "Horror Drone" },
    LayerInfo { id: "soft-pads", name: "Soft Pads" },
    LayerInfo { id: "meditation", name: "Meditation Bells" },
    LayerInfo { id: "muharram", name: "Muharram Chest-Beat" },
];

/// Look up a catalog entry by id.
pub fn layer_info(id: &str) -> Option<&'static LayerInfo> {
    BACKGROUND_LAYERS.iter().find(|l| l.id == id)
}

// ── Synthesis ───────────────────────────────────────────────

/// Paul Kellet's economy pink filter: three leaky integrators plus a white
/// residual. State persists across the whole buffer.
#[derive(Debug, Clone, Default)]
struct PinkFilter {
    b0: f32,
    b1: f32,
    b2: f32,
}

impl PinkFilter {
    #[inline]
    fn process(&mut self, white: f32) -> f32 {
        self.b0 = 0.99765 * self.b0 + white * 0.0990460;
        self.b1 = 0.96300 * self.b1 + white * 0.2965164;
        self.b2 = 0.57000 * self.b2 + white * 1.0526913;
        self.b0 + self.b1 + self.b2 + white * 0.1848
    }
}

const NIGHT_NOISE_LEVEL: f32 = 0.1;
const NIGHT_TONE_STEP: f64 = 0.001;
const NIGHT_TONE_LEVEL: f64 = 0.05;
const FIRE_THRESHOLD: f32 = 0.95;
const FIRE_LEVEL: f32 = 0.5;

#[inline]
fn white<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    rng.random::<f32>() * 2.0 - 1.0
}

/// Synthesize `duration` seconds of the requested ambience.
///
/// Returns `Ok(None)` for [`BackgroundLayer::None`]; the caller then leaves
/// the layer out of the mix entirely.
pub fn synthesize<R: Rng + ?Sized>(
    layer: &BackgroundLayer,
    sample_rate: u32,
    duration: f64,
    rng: &mut R,
) -> Result<Option<AudioBuffer>, SynthesisError> {
    if layer.is_none() {
        return Ok(None);
    }
    if !duration.is_finite() || duration <= 0.0 {
        return Err(SynthesisError::InvalidDuration(duration));
    }

    let length = (sample_rate as f64 * duration) as usize;
    let data: Vec<f32> = match layer {
        BackgroundLayer::Rain => {
            let mut pink = PinkFilter::default();
            (0..length).map(|_| pink.process(white(rng))).collect()
        }
        BackgroundLayer::Night => (0..length)
            .map(|i| {
                let tone = ((i as f64 * NIGHT_TONE_STEP).sin() * NIGHT_TONE_LEVEL) as f32;
                white(rng) * NIGHT_NOISE_LEVEL + tone
            })
            .collect(),
        BackgroundLayer::Fire => (0..length)
            .map(|_| {
                if rng.random::<f32>() > FIRE_THRESHOLD {
                    rng.random::<f32>() * FIRE_LEVEL
                } else {
                    0.0
                }
            })
            .collect(),
        BackgroundLayer::Other(_) | BackgroundLayer::None => (0..length).map(|_| white(rng)).collect(),
    };

    debug!(layer = %layer, length, "synthesized background");
    Ok(Some(AudioBuffer::mono(data, sample_rate)))
}
