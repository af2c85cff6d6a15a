//! DSP Engine — pure Rust voice post-processing.
//!
//! Decoding, synthesis, graph rendering and WAV encoding all run in Rust, so
//! the browser build (via WASM) and native callers produce the same mix.

pub mod ambience;
pub mod buffer;
pub mod convolver;
pub mod decoder;
pub mod engine;
pub mod graph;
pub mod impulse;
pub mod mixer;
pub mod params;
pub mod renderer;
pub mod source;
pub mod wav;
