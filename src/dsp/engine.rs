//! Mix engine — turns raw speech PCM plus user controls into one rendered
//! buffer.
//!
//! For each call the engine decodes the voice, sizes an offline graph from
//! the stretched voice length plus a fixed tail, wires a dry path, an
//! optional convolution reverb path and an optional ambience layer into the
//! destination, and renders the whole thing in one pass. Every call builds
//! its own graph and buffers; nothing is cached between mixes.

use rand::Rng;
use tracing::{debug, info, warn};

use super::ambience::{self, BackgroundLayer};
use super::buffer::AudioBuffer;
use super::decoder::decode_pcm16;
use super::graph::{AudioGraph, OfflineGraph};
use super::impulse::impulse_response;
use super::params::MixParameters;
use super::wav::{WavBlob, encode_wav};
use crate::config::MixConfig;
use crate::error::{MixError, RenderError, SynthesisError};

/// The rendered mix together with the timing it was rendered with.
#[derive(Debug, Clone)]
pub struct RenderedMix {
    buffer: AudioBuffer,
    /// Playback-rate multiplier applied to the voice.
    pub speed_rate: f64,
    /// Detune applied to the voice, in cents.
    pub detune_cents: f64,
    /// Voice length after the speed change, in seconds.
    pub voice_duration: f64,
    /// Total rendered length (voice + tail), in seconds.
    pub output_duration: f64,
}

impl RenderedMix {
    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> AudioBuffer {
        self.buffer
    }

    /// Mono samples of the mix.
    pub fn samples(&self) -> &[f32] {
        self.buffer.channel(0).unwrap_or(&[])
    }

    pub fn to_wav(&self) -> WavBlob {
        encode_wav(&self.buffer)
    }
}

/// Offline voice mixer.
#[derive(Debug, Clone, Default)]
pub struct MixEngine {
    config: MixConfig,
}

impl MixEngine {
    pub fn new(config: MixConfig) -> Result<Self, MixError> {
        config.validate()?;
        Ok(MixEngine { config })
    }

    pub fn config(&self) -> &MixConfig {
        &self.config
    }

    /// Mix with the generator the config asks for (seeded or OS entropy).
    pub fn mix_auto(
        &self,
        voice_pcm: &[u8],
        layer: &BackgroundLayer,
        params: &MixParameters,
    ) -> Result<RenderedMix, MixError> {
        let mut rng = self.config.rng();
        self.mix(voice_pcm, layer, params, &mut rng)
    }

    /// Mix on the built-in [`OfflineGraph`] backend.
    pub fn mix<R: Rng + ?Sized>(
        &self,
        voice_pcm: &[u8],
        layer: &BackgroundLayer,
        params: &MixParameters,
        rng: &mut R,
    ) -> Result<RenderedMix, MixError> {
        self.mix_with(voice_pcm, layer, params, rng, |frames, sample_rate| {
            OfflineGraph::new(1, frames, sample_rate)
        })
    }

    /// Mix an already-decoded voice buffer on the built-in backend.
    pub fn mix_buffer<R: Rng + ?Sized>(
        &self,
        voice: AudioBuffer,
        layer: &BackgroundLayer,
        params: &MixParameters,
        rng: &mut R,
    ) -> Result<RenderedMix, MixError> {
        self.mix_buffer_with(voice, layer, params, rng, |frames, sample_rate| {
            OfflineGraph::new(1, frames, sample_rate)
        })
    }

    /// Mix on any [`AudioGraph`] backend. `make_graph` receives the frame
    /// count and sample rate of the render target.
    pub fn mix_with<R, G, F>(
        &self,
        voice_pcm: &[u8],
        layer: &BackgroundLayer,
        params: &MixParameters,
        rng: &mut R,
        make_graph: F,
    ) -> Result<RenderedMix, MixError>
    where
        R: Rng + ?Sized,
        G: AudioGraph,
        F: FnOnce(usize, u32) -> G,
    {
        let voice = decode_pcm16(voice_pcm, self.config.sample_rate, 1)?;
        self.mix_buffer_with(voice, layer, params, rng, make_graph)
    }

    /// Build and render the graph for a decoded voice. A voice recorded at a
    /// different rate than the config is resampled by its source node.
    pub fn mix_buffer_with<R, G, F>(
        &self,
        voice: AudioBuffer,
        layer: &BackgroundLayer,
        params: &MixParameters,
        rng: &mut R,
        make_graph: F,
    ) -> Result<RenderedMix, MixError>
    where
        R: Rng + ?Sized,
        G: AudioGraph,
        F: FnOnce(usize, u32) -> G,
    {
        let sample_rate = self.config.sample_rate;
        if let BackgroundLayer::Other(id) = layer {
            if self.config.strict_layers {
                return Err(SynthesisError::UnknownLayer(id.clone()).into());
            }
            warn!(layer = %id, "no recipe for background layer, using white noise");
        }

        let speed_rate = params.speed_rate();
        let detune_cents = params.detune_cents();
        let voice_duration = voice.duration() / speed_rate;
        let output_duration = voice_duration + self.config.reverb_tail;
        if output_duration > self.config.max_output_seconds {
            return Err(RenderError::DurationLimit {
                requested: output_duration,
                limit: self.config.max_output_seconds,
            }
            .into());
        }
        let frames = (output_duration * sample_rate as f64).ceil() as usize;

        info!(
            voice_seconds = voice.duration(),
            speed_rate,
            detune_cents,
            output_seconds = output_duration,
            frames,
            layer = %layer,
            "mixing voice"
        );

        let mut graph = make_graph(frames, sample_rate);
        let destination = graph.destination();

        let source = graph.create_source(voice, speed_rate, detune_cents);
        let dry = graph.create_gain(1.0);
        graph.connect(source, dry)?;
        graph.connect(dry, destination)?;

        if params.reverb_enabled() {
            let impulse = impulse_response(
                sample_rate,
                self.config.impulse_duration,
                self.config.impulse_decay,
                rng,
            )?;
            let convolver = graph.create_convolver(impulse)?;
            let wet = graph.create_gain(params.wet_gain());
            graph.connect(source, convolver)?;
            graph.connect(convolver, wet)?;
            graph.connect(wet, destination)?;
            debug!(wet_gain = params.wet_gain(), "reverb path connected");
        }

        let mut background = None;
        if frames > 0 {
            if let Some(ambience) = ambience::synthesize(layer, sample_rate, output_duration, rng)? {
                let bg_source = graph.create_source(ambience, 1.0, 0.0);
                let bg_gain = graph.create_gain(params.background_gain());
                graph.connect(bg_source, bg_gain)?;
                graph.connect(bg_gain, destination)?;
                background = Some(bg_source);
                debug!(gain = params.background_gain(), "background layer connected");
            }
        }

        graph.start(source, 0.0)?;
        if let Some(bg_source) = background {
            graph.start(bg_source, 0.0)?;
        }

        let buffer = graph.render()?;
        info!(frames = buffer.frames(), "mix rendered");

        Ok(RenderedMix {
            buffer,
            speed_rate,
            detune_cents,
            voice_duration,
            output_duration,
        })
    }
}
