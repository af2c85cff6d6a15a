//! User-facing mix controls and their mapping to DSP values.
//!
//! All four controls are 0–100 slider percentages. The mapping functions
//! do not clamp; use [`MixParameters::clamped`] or
//! [`MixParameters::validate`] at the call site.

use serde::{Deserialize, Serialize};

use crate::error::MixError;

/// Peak wet gain at reverb 100.
pub const MAX_WET_GAIN: f32 = 0.5;
/// Peak background gain at volume 100.
pub const MAX_BACKGROUND_GAIN: f32 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MixParameters {
    /// 0 disables the convolution path.
    pub reverb_amount: f32,
    pub background_volume: f32,
    /// 50 is original speed.
    pub speed: f32,
    /// 50 is original pitch.
    pub pitch: f32,
}

impl Default for MixParameters {
    fn default() -> Self {
        MixParameters {
            reverb_amount: 20.0,
            background_volume: 30.0,
            speed: 50.0,
            pitch: 50.0,
        }
    }
}

impl MixParameters {
    /// Neutral settings: no reverb, no background, original speed and pitch.
    pub fn dry() -> Self {
        MixParameters {
            reverb_amount: 0.0,
            background_volume: 0.0,
            speed: 50.0,
            pitch: 50.0,
        }
    }

    /// Playback-rate multiplier in [0.5, 1.5].
    pub fn speed_rate(&self) -> f64 {
        0.5 + self.speed as f64 / 100.0
    }

    /// Detune offset in cents in [-600, 600].
    pub fn detune_cents(&self) -> f64 {
        (self.pitch as f64 - 50.0) * 12.0
    }

    pub fn reverb_enabled(&self) -> bool {
        self.reverb_amount > 0.0
    }

    pub fn wet_gain(&self) -> f32 {
        self.reverb_amount / 100.0 * MAX_WET_GAIN
    }

    pub fn background_gain(&self) -> f32 {
        self.background_volume / 100.0 * MAX_BACKGROUND_GAIN
    }

    /// Pull every control into 0..=100. NaN falls back to the neutral value.
    pub fn clamped(self) -> Self {
        let clamp = |v: f32, neutral: f32| if v.is_nan() { neutral } else { v.clamp(0.0, 100.0) };
        MixParameters {
            reverb_amount: clamp(self.reverb_amount, 0.0),
            background_volume: clamp(self.background_volume, 0.0),
            speed: clamp(self.speed, 50.0),
            pitch: clamp(self.pitch, 50.0),
        }
    }

    /// Reject any control outside 0..=100 (including NaN).
    pub fn validate(&self) -> Result<(), MixError> {
        let fields = [
            ("reverbAmount", self.reverb_amount),
            ("backgroundVolume", self.background_volume),
            ("speed", self.speed),
            ("pitch", self.pitch),
        ];
        for (name, value) in fields {
            if !(0.0..=100.0).contains(&value) {
                return Err(MixError::InvalidParameter { name, value });
            }
        }
        Ok(())
    }
}
