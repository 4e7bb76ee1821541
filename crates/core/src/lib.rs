//! Core library for the audio-reactive poster.
//!
//! The crate drives an animated poster synchronized to the frequency content
//! of an audio track: a spectrum source takes live snapshots, the bar
//! aggregator reduces them into a handful of normalised bars, a cooperative
//! frame loop paces the updates, and the poster manager keeps source
//! readiness, loop state, and the animation handle consistent. Rendering and
//! audio decoding stay outside the crate, behind the [`Animation`] and
//! [`AudioLoader`] seams.

pub mod analyzer;
pub mod bars;
pub mod config;
pub mod error;
pub mod frame_loop;
pub mod poster;
pub mod spectrum;

pub use analyzer::AudioAnalyzer;
pub use bars::{aggregate, AnalysisResult, BarDatum};
pub use config::AnalysisConfig;
pub use error::{PosterError, Result};
pub use frame_loop::{FrameLoop, LoopHooks, LoopState, DEFAULT_FRAME_RATE};
pub use poster::{Animation, AnimationFactory, PosterConfig, PosterManager, UpdateCallback};
pub use spectrum::{
    AudioBuffer, AudioLoader, FftSource, FftSourceOptions, Readiness, SpectrumSource,
};
