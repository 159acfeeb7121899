//! Fae lip-sync: viseme timelines for synthesized speech.
//!
//! Given a reply's text and the WAV bytes the TTS engine produced for it,
//! this crate builds a gap-free sequence of mouth shapes covering the audio:
//! Text + WAV → duration probe → forced alignment (optional) → smoothing
//!
//! # Architecture
//!
//! - **Audio**: Reads the WAV header to find the exact playback duration
//! - **Alignment**: Asks an external HTTP aligner for phoneme timings,
//!   degrading to "unavailable" on any failure or timeout
//! - **Visemes**: Maps phonemes to mouth shapes and smooths the result
//! - **Fallback**: Spreads heuristic phonemes over the duration when
//!   alignment is unavailable
//! - **Pipeline**: Chooses a path per turn and returns the final timeline

pub mod align;
pub mod audio;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod viseme;

pub use config::LipSyncConfig;
pub use error::{LipSyncError, Result};
pub use pipeline::{LipSyncPipeline, TimelineRequest, TimelineResult, TimelineSource};
pub use viseme::{Viseme, VisemeSegment, VisemeTimeline};
