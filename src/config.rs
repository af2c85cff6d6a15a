//! Engine configuration.
//!
//! Every field has a default matching the speech provider's output and the
//! product's fixed reverb settings, so `{}` is a complete config.

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Sample rate of the speech provider's PCM output.
pub const VOICE_SAMPLE_RATE: u32 = 24000;
/// Highest accepted render rate.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MixConfig {
    /// Rate of the incoming voice PCM and of the rendered mix.
    pub sample_rate: u32,
    /// Seconds appended after the stretched voice, reverb on or off.
    pub reverb_tail: f64,
    /// Length of the synthesized impulse response in seconds.
    pub impulse_duration: f64,
    /// Envelope exponent of the impulse response.
    pub impulse_decay: f64,
    /// Renders longer than this are refused before any allocation.
    pub max_output_seconds: f64,
    /// Refuse background ids without a dedicated recipe instead of
    /// falling back to white noise.
    pub strict_layers: bool,
    /// Fixed RNG seed for reproducible renders. `None` draws from the OS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for MixConfig {
    fn default() -> Self {
        MixConfig {
            sample_rate: VOICE_SAMPLE_RATE,
            reverb_tail: 2.0,
            impulse_duration: 2.0,
            impulse_decay: 2.0,
            max_output_seconds: 600.0,
            strict_layers: false,
            seed: None,
        }
    }
}

impl MixConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: MixConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = |field: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::NotPositive { field, value })
            }
        };
        positive("sampleRate", self.sample_rate as f64)?;
        if self.sample_rate > MAX_SAMPLE_RATE {
            return Err(ConfigError::SampleRateTooHigh {
                value: self.sample_rate,
                max: MAX_SAMPLE_RATE,
            });
        }
        positive("impulseDuration", self.impulse_duration)?;
        positive("impulseDecay", self.impulse_decay)?;
        positive("maxOutputSeconds", self.max_output_seconds)?;
        if !self.reverb_tail.is_finite() || self.reverb_tail < 0.0 {
            return Err(ConfigError::NotPositive {
                field: "reverbTail",
                value: self.reverb_tail,
            });
        }
        Ok(())
    }

    /// The generator a render should draw its noise from.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}
