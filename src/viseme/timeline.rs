//! Gap-free viseme timelines.

use super::{Viseme, VisemeSegment};
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Boundary tolerance, in seconds, for contiguity and start-at-zero checks.
pub const TIME_EPSILON: f64 = 1e-3;

/// A broken timeline guarantee, reported by [`VisemeTimeline::check_invariants`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantViolation {
    /// The timeline has no segments.
    #[error("timeline is empty")]
    Empty,
    /// The first segment does not start at zero.
    #[error("first segment starts at {start}")]
    FirstStart {
        /// Offending start time.
        start: f64,
    },
    /// A segment has `end <= start`.
    #[error("segment {index} has an empty span")]
    EmptySpan {
        /// Segment index.
        index: usize,
    },
    /// A segment starts before its predecessor ends.
    #[error("segment {index} overlaps its predecessor")]
    Overlap {
        /// Segment index.
        index: usize,
    },
    /// A segment starts after its predecessor ends.
    #[error("gap before segment {index}")]
    Gap {
        /// Segment index.
        index: usize,
    },
    /// The last segment does not end exactly at the audio duration.
    #[error("last segment ends at {end}, duration is {duration}")]
    LastEnd {
        /// Offending end time.
        end: f64,
        /// Audio duration.
        duration: f64,
    },
    /// A segment is shorter than the hold floor.
    #[error("segment {index} lasts {length}s, below the hold floor")]
    BelowFloor {
        /// Segment index.
        index: usize,
        /// Segment length in seconds.
        length: f64,
    },
}

/// Ordered, contiguous viseme segments covering `[0, duration]`.
///
/// Built by [`Smoother`](super::Smoother) and
/// [`FallbackBuilder`](super::FallbackBuilder); both guarantee the
/// properties [`check_invariants`](Self::check_invariants) verifies.
/// Serializes as a plain array of segments.
#[derive(Debug, Clone, PartialEq)]
pub struct VisemeTimeline {
    segments: Vec<VisemeSegment>,
    duration: f64,
}

impl VisemeTimeline {
    /// A single `rest` segment spanning the whole duration.
    pub fn rest(duration: f64) -> Self {
        Self {
            segments: vec![VisemeSegment::rest(0.0, duration)],
            duration,
        }
    }

    /// Wrap segments that are already normalized.
    pub(crate) fn from_normalized(segments: Vec<VisemeSegment>, duration: f64) -> Self {
        if segments.is_empty() {
            return Self::rest(duration);
        }
        Self { segments, duration }
    }

    /// Segments in time order.
    pub fn segments(&self) -> &[VisemeSegment] {
        &self.segments
    }

    /// Consume the timeline, returning its segments.
    pub fn into_segments(self) -> Vec<VisemeSegment> {
        self.segments
    }

    /// Total covered duration in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Number of segments (always at least one).
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Iterate segments in time order.
    pub fn iter(&self) -> std::slice::Iter<'_, VisemeSegment> {
        self.segments.iter()
    }

    /// Viseme shown at time `t` seconds. Times outside the timeline clamp to
    /// the first or last segment.
    pub fn viseme_at(&self, t: f64) -> Viseme {
        let idx = self
            .segments
            .partition_point(|seg| seg.end <= t)
            .min(self.segments.len().saturating_sub(1));
        self.segments
            .get(idx)
            .map_or(Viseme::Rest, |seg| seg.viseme)
    }

    /// Sample the timeline at `fps` frames per second.
    ///
    /// Frame `k` shows the viseme active at `k / fps`. Returns an empty vec
    /// for a non-positive frame rate.
    pub fn frames(&self, fps: f64) -> Vec<Viseme> {
        if !fps.is_finite() || fps <= 0.0 {
            return Vec::new();
        }
        let count = (self.duration * fps).ceil().max(1.0) as usize;
        (0..count)
            .map(|k| self.viseme_at(k as f64 / fps))
            .collect()
    }

    /// Verify ordering, contiguity, coverage, and the hold floor.
    ///
    /// A segment below `min_hold` is only accepted when the whole timeline is
    /// shorter than the floor.
    pub fn check_invariants(&self, min_hold: f64) -> Result<(), InvariantViolation> {
        let first = self.segments.first().ok_or(InvariantViolation::Empty)?;
        if first.start.abs() > TIME_EPSILON {
            return Err(InvariantViolation::FirstStart { start: first.start });
        }

        for (index, seg) in self.segments.iter().enumerate() {
            if seg.end <= seg.start {
                return Err(InvariantViolation::EmptySpan { index });
            }
            if index > 0 {
                let prev_end = self.segments[index - 1].end;
                if seg.start < prev_end - TIME_EPSILON {
                    return Err(InvariantViolation::Overlap { index });
                }
                if seg.start > prev_end + TIME_EPSILON {
                    return Err(InvariantViolation::Gap { index });
                }
            }
            let length = seg.duration();
            if length < min_hold - TIME_EPSILON && self.duration >= min_hold {
                return Err(InvariantViolation::BelowFloor { index, length });
            }
        }

        let last = self.segments.last().ok_or(InvariantViolation::Empty)?;
        if last.end != self.duration {
            return Err(InvariantViolation::LastEnd {
                end: last.end,
                duration: self.duration,
            });
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a VisemeTimeline {
    type Item = &'a VisemeSegment;
    type IntoIter = std::slice::Iter<'a, VisemeSegment>;

    fn into_iter(self) -> Self::IntoIter {
        self.segments.iter()
    }
}

impl Serialize for VisemeTimeline {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.segments.len()))?;
        for seg in &self.segments {
            seq.serialize_element(seg)?;
        }
        seq.end()
    }
}
