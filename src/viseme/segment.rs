//! Timed phoneme and viseme segments.

use super::{Viseme, normalize_label};
use serde::{Deserialize, Serialize};

/// Start times this far below zero are treated as rounding noise.
const NEGATIVE_START_TOLERANCE: f64 = 1e-3;

/// Confidence attached to phonemes produced by the heuristic phonemizer.
pub const HEURISTIC_CONFIDENCE: f32 = 0.5;

/// Confidence attached to aligned phonemes when the service reports none.
pub const ALIGNED_CONFIDENCE: f32 = 0.9;

/// One phoneme occupying `[start, end)` seconds.
///
/// Constructed only through [`PhonemeSegment::new`], which normalizes the
/// label and rejects impossible timings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhonemeSegment {
    label: String,
    start: f64,
    end: f64,
    confidence: f32,
}

impl PhonemeSegment {
    /// Create a segment, or `None` when the timing is unusable.
    ///
    /// Non-finite values, `end <= start`, and starts meaningfully below zero
    /// are rejected. Confidence is clamped to `[0, 1]`; NaN falls back to
    /// [`ALIGNED_CONFIDENCE`].
    pub fn new(label: &str, start: f64, end: f64, confidence: f32) -> Option<Self> {
        if !start.is_finite() || !end.is_finite() || start < -NEGATIVE_START_TOLERANCE {
            return None;
        }
        let start = start.max(0.0);
        if end <= start {
            return None;
        }
        let confidence = if confidence.is_nan() {
            ALIGNED_CONFIDENCE
        } else {
            confidence.clamp(0.0, 1.0)
        };
        Some(Self {
            label: normalize_label(label),
            start,
            end,
            confidence,
        })
    }

    /// Normalized phoneme label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Start time in seconds.
    pub fn start(&self) -> f64 {
        self.start
    }

    /// End time in seconds.
    pub fn end(&self) -> f64 {
        self.end
    }

    /// Confidence in `[0, 1]`.
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Copy of this segment covering a different span, keeping label and
    /// confidence. `None` if the span is empty.
    pub(crate) fn with_span(&self, start: f64, end: f64) -> Option<Self> {
        Self::new(&self.label, start, end, self.confidence)
    }

    /// Copy with a new confidence.
    pub(crate) fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }
}

/// One mouth shape held over `[start, end)` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisemeSegment {
    /// Mouth shape.
    pub viseme: Viseme,
    /// Start time in seconds.
    pub start: f64,
    /// End time in seconds.
    pub end: f64,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

impl VisemeSegment {
    /// Create a segment.
    pub fn new(viseme: Viseme, start: f64, end: f64, confidence: f32) -> Self {
        Self {
            viseme,
            start,
            end,
            confidence,
        }
    }

    /// An explicit silent span.
    pub fn rest(start: f64, end: f64) -> Self {
        Self::new(Viseme::Rest, start, end, 1.0)
    }

    /// Length in seconds.
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}
