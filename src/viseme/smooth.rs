//! Timeline smoothing: merging, flicker removal, gap filling.
//!
//! Raw aligner output is jittery at the sprite level: back-to-back phonemes
//! that share a mouth shape, one-frame blips between identical shapes, and
//! short silences between words. Sprites swapped at that rate read as
//! flicker, so every timeline passes through [`Smoother`] before it leaves
//! the crate.

use super::timeline::VisemeTimeline;
use super::{PhonemeSegment, Viseme, VisemeSegment, phoneme_to_viseme};
use crate::config::TimelineConfig;
use tracing::debug;

/// Slack for floating-point comparisons against the thresholds.
const EPS: f64 = 1e-9;

/// Applies merge, flicker, and hold-floor rules to segment lists.
#[derive(Debug, Clone, Copy)]
pub struct Smoother {
    merge_gap: f64,
    flicker: f64,
    min_hold: f64,
}

impl Default for Smoother {
    fn default() -> Self {
        Self::new(&TimelineConfig::default())
    }
}

impl Smoother {
    /// Create a smoother from millisecond thresholds.
    pub fn new(config: &TimelineConfig) -> Self {
        Self {
            merge_gap: ms(config.merge_gap_ms),
            flicker: ms(config.flicker_ms),
            min_hold: ms(config.min_hold_ms),
        }
    }

    /// Shortest allowed segment, in seconds.
    pub fn min_hold(&self) -> f64 {
        self.min_hold
    }

    /// Run the full chain on aligned phonemes and produce a timeline
    /// covering exactly `[0, duration]`.
    pub fn smooth(&self, phonemes: &[PhonemeSegment], duration: f64) -> VisemeTimeline {
        let merged = self.merge_phonemes(phonemes);
        let steady = self.drop_flicker(&merged);
        let visemes = self.to_visemes(&steady);
        debug!(
            phonemes = phonemes.len(),
            merged = merged.len(),
            steady = steady.len(),
            visemes = visemes.len(),
            "smoothing aligned phonemes"
        );
        self.smooth_visemes(visemes, duration)
    }

    /// Merge each phoneme into its predecessor when both carry the same
    /// label and the gap between them is below the merge threshold.
    ///
    /// The merged entry ends at the later end and keeps the higher confidence.
    pub fn merge_phonemes(&self, phonemes: &[PhonemeSegment]) -> Vec<PhonemeSegment> {
        let mut sorted = phonemes.to_vec();
        sorted.sort_by(|a, b| a.start().total_cmp(&b.start()));

        let mut out: Vec<PhonemeSegment> = Vec::with_capacity(sorted.len());
        for seg in sorted {
            if let Some(last) = out.last_mut()
                && last.label() == seg.label()
                && seg.start() - last.end() < self.merge_gap
            {
                if let Some(merged) = last.with_span(last.start(), last.end().max(seg.end())) {
                    *last = merged.with_confidence(last.confidence().max(seg.confidence()));
                }
                continue;
            }
            out.push(seg);
        }
        out
    }

    /// Drop short phonemes whose neighbours map to the same viseme; the
    /// preceding phoneme absorbs the span.
    ///
    /// The left neighbour is the last phoneme kept, not the last one seen. A
    /// short phoneme between neighbours with different visemes is kept.
    pub fn drop_flicker(&self, phonemes: &[PhonemeSegment]) -> Vec<PhonemeSegment> {
        let mut out: Vec<PhonemeSegment> = Vec::with_capacity(phonemes.len());
        for (i, seg) in phonemes.iter().enumerate() {
            if let Some(prev) = out.last_mut()
                && let Some(next) = phonemes.get(i + 1)
                && seg.duration() < self.flicker
                && phoneme_to_viseme(prev.label()) == phoneme_to_viseme(next.label())
            {
                if let Some(extended) = prev.with_span(prev.start(), prev.end().max(seg.end())) {
                    *prev = extended;
                }
                continue;
            }
            out.push(seg.clone());
        }
        out
    }

    /// Units at or above this length survive the flicker and floor passes.
    pub(crate) fn keep_threshold(&self) -> f64 {
        self.min_hold.max(self.flicker)
    }

    /// Map phonemes to visemes, merging adjacent runs of the same viseme.
    pub fn to_visemes(&self, phonemes: &[PhonemeSegment]) -> Vec<VisemeSegment> {
        let segments = phonemes.iter().map(|p| {
            VisemeSegment::new(phoneme_to_viseme(p.label()), p.start(), p.end(), p.confidence())
        });
        let mut out = Vec::with_capacity(phonemes.len());
        for seg in segments {
            push_merging(&mut out, seg, self.merge_gap);
        }
        out
    }

    /// Normalize viseme segments into a timeline over `[0, duration]`.
    ///
    /// Sorts and de-overlaps, clamps to the duration, fills gaps with `rest`,
    /// then repeats merging, flicker removal, and hold-floor enforcement until
    /// nothing changes. Running this on its own output is the identity.
    pub fn smooth_visemes(&self, segments: Vec<VisemeSegment>, duration: f64) -> VisemeTimeline {
        if !duration.is_finite() || duration <= 0.0 {
            return VisemeTimeline::rest(duration);
        }

        let mut segs = clip(segments, duration);
        // The first pass may add one rest per gap; every later pass that
        // changes anything removes at least one segment.
        let max_passes = 2 * segs.len() + 4;
        for _ in 0..max_passes {
            let before = segs.clone();
            segs = self.merge_adjacent(segs);
            segs = self.fill_gaps(segs, duration);
            segs = self.remove_flicker(segs);
            segs = self.enforce_floor(segs);
            if segs == before {
                break;
            }
        }

        if let Some(first) = segs.first_mut() {
            first.start = 0.0;
        }
        if let Some(last) = segs.last_mut() {
            last.end = duration;
        }
        VisemeTimeline::from_normalized(segs, duration)
    }

    fn merge_adjacent(&self, segs: Vec<VisemeSegment>) -> Vec<VisemeSegment> {
        let mut out = Vec::with_capacity(segs.len());
        for seg in segs {
            push_merging(&mut out, seg, self.merge_gap);
        }
        out
    }

    /// Make the list contiguous from zero to `duration`. Gaps at least one
    /// hold long become `rest`; shorter ones are absorbed by the neighbour.
    fn fill_gaps(&self, segs: Vec<VisemeSegment>, duration: f64) -> Vec<VisemeSegment> {
        let mut out: Vec<VisemeSegment> = Vec::with_capacity(segs.len() + 2);
        let mut cursor = 0.0;

        for mut seg in segs {
            let gap = seg.start - cursor;
            if gap > 0.0 {
                if gap + EPS >= self.min_hold {
                    out.push(VisemeSegment::rest(cursor, seg.start));
                } else if let Some(prev) = out.last_mut() {
                    prev.end = seg.start;
                } else {
                    seg.start = cursor;
                }
            }
            cursor = seg.end;
            out.push(seg);
        }

        let tail = duration - cursor;
        if tail > 0.0 {
            match out.last_mut() {
                Some(last) if tail + EPS < self.min_hold => last.end = duration,
                _ => out.push(VisemeSegment::rest(cursor, duration)),
            }
        }
        out
    }

    /// Collapse `X, short Y, X` into one `X`.
    fn remove_flicker(&self, segs: Vec<VisemeSegment>) -> Vec<VisemeSegment> {
        let mut out: Vec<VisemeSegment> = Vec::with_capacity(segs.len());
        let mut i = 0;
        while i < segs.len() {
            let seg = segs[i];
            if let Some(prev) = out.last_mut()
                && let Some(next) = segs.get(i + 1)
                && seg.duration() < self.flicker
                && prev.viseme == next.viseme
            {
                prev.end = next.end;
                prev.confidence = prev.confidence.max(next.confidence);
                i += 2;
                continue;
            }
            out.push(seg);
            i += 1;
        }
        out
    }

    /// Absorb segments shorter than the hold floor into a neighbour: the
    /// previous one when there is one, otherwise the next. A timeline shorter
    /// than the floor ends up as a single segment.
    fn enforce_floor(&self, segs: Vec<VisemeSegment>) -> Vec<VisemeSegment> {
        let count = segs.len();
        let mut out: Vec<VisemeSegment> = Vec::with_capacity(count);
        let mut carried_start: Option<f64> = None;

        for (i, mut seg) in segs.into_iter().enumerate() {
            if let Some(start) = carried_start.take() {
                seg.start = start;
            }
            if seg.duration() + EPS < self.min_hold {
                if let Some(prev) = out.last_mut() {
                    prev.end = seg.end;
                    continue;
                }
                if i + 1 < count {
                    carried_start = Some(seg.start);
                    continue;
                }
            }
            out.push(seg);
        }
        out
    }
}

fn ms(value: u32) -> f64 {
    f64::from(value) / 1000.0
}

/// Push `seg`, folding it into the last entry when both show the same viseme
/// and the gap is below `merge_gap`.
fn push_merging(out: &mut Vec<VisemeSegment>, seg: VisemeSegment, merge_gap: f64) {
    if let Some(last) = out.last_mut()
        && last.viseme == seg.viseme
        && seg.start - last.end < merge_gap
    {
        last.end = last.end.max(seg.end);
        last.confidence = last.confidence.max(seg.confidence);
        return;
    }
    out.push(seg);
}

/// Sort, drop unusable entries, remove overlaps, and clamp to `duration`.
fn clip(mut segments: Vec<VisemeSegment>, duration: f64) -> Vec<VisemeSegment> {
    segments.retain(|s| s.start.is_finite() && s.end.is_finite() && s.end > s.start);
    segments.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut out: Vec<VisemeSegment> = Vec::with_capacity(segments.len());
    let mut cursor = 0.0_f64;
    for mut seg in segments {
        seg.start = seg.start.max(cursor);
        seg.end = seg.end.min(duration);
        if seg.end - seg.start <= EPS {
            continue;
        }
        cursor = seg.end;
        out.push(seg);
    }
    out
}

/// `true` if `segments` carries at least one non-rest viseme.
pub fn has_speech(segments: &[VisemeSegment]) -> bool {
    segments.iter().any(|s| s.viseme != Viseme::Rest)
}
