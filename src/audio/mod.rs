//! Waveform inspection for synthesized speech.

pub mod wav;

pub use wav::{WavInfo, probe_duration};
