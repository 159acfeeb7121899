//! Heuristic viseme timeline for when forced alignment is unavailable.
//!
//! The known audio duration is spread over the words of the transcript in
//! proportion to their letter count, with a short rest between words, and
//! each word's share is divided among its phoneme units by the letters that
//! spelled them. The result is only an approximation of the real speech, but
//! it starts and stops with the audio and moves the mouth at a plausible
//! rate.

use super::phonemize::{PhonemeUnit, clean_text, phonemize_units};
use super::segment::HEURISTIC_CONFIDENCE;
use super::smooth::Smoother;
use super::timeline::VisemeTimeline;
use super::{VisemeSegment, phoneme_to_viseme};
use crate::config::{FallbackConfig, TimelineConfig};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// Inter-word rests may take at most this fraction of the duration.
const MAX_GAP_SHARE: f64 = 1.0 / 3.0;

/// Jittered units stay this far above the keep threshold.
const JITTER_MARGIN: f64 = 1e-6;

/// Builds approximate timelines from text and a known duration.
#[derive(Debug, Clone)]
pub struct FallbackBuilder {
    smoother: Smoother,
    word_gap: f64,
    jitter: f64,
    seed: Option<u64>,
}

impl FallbackBuilder {
    /// Create a builder from config.
    pub fn new(timeline: &TimelineConfig, fallback: &FallbackConfig) -> Self {
        Self {
            smoother: Smoother::new(timeline),
            word_gap: f64::from(fallback.word_gap_ms) / 1000.0,
            jitter: fallback.jitter.max(0.0),
            seed: fallback.seed,
        }
    }

    /// Build a timeline for `text` covering exactly `[0, duration]`.
    ///
    /// Text without any alphanumeric content yields a single `rest`.
    pub fn build(&self, text: &str, duration: f64) -> VisemeTimeline {
        let cleaned = clean_text(text);
        let words: Vec<Vec<PhonemeUnit>> = cleaned
            .split_whitespace()
            .map(phonemize_units)
            .filter(|units| !units.is_empty())
            .collect();

        if words.is_empty() || !duration.is_finite() || duration <= 0.0 {
            return VisemeTimeline::rest(duration);
        }

        let gap = self.word_gap_for(words.len(), duration);
        let speech = duration - gap * (words.len() - 1) as f64;
        let total_chars: usize = words.iter().map(|w| letters(w)).sum();
        let mut rng = (self.jitter > 0.0).then(|| match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        });

        let mut segments: Vec<VisemeSegment> = Vec::new();
        let mut cursor = 0.0;
        for (index, units) in words.iter().enumerate() {
            let share = speech * letters(units) as f64 / total_chars as f64;
            let word_end = cursor + share;
            let spans = self.unit_spans(units, share, rng.as_mut());

            for (i, (unit, span)) in units.iter().zip(&spans).enumerate() {
                let end = if i + 1 == units.len() {
                    word_end
                } else {
                    cursor + span
                };
                let viseme = phoneme_to_viseme(unit.label);
                match segments.last_mut() {
                    Some(last) if last.viseme == viseme => last.end = end,
                    _ => segments.push(VisemeSegment::new(
                        viseme,
                        cursor,
                        end,
                        HEURISTIC_CONFIDENCE,
                    )),
                }
                cursor = end;
            }

            if index + 1 < words.len() && gap > 0.0 {
                segments.push(VisemeSegment::rest(cursor, cursor + gap));
                cursor += gap;
            }
        }

        debug!(
            words = words.len(),
            segments = segments.len(),
            gap_secs = gap,
            duration_secs = duration,
            "built fallback viseme sequence"
        );
        self.smoother.smooth_visemes(segments, duration)
    }

    /// Rest length between words: the configured gap, shrunk so all gaps
    /// together stay within [`MAX_GAP_SHARE`], or zero when a gap would fall
    /// below the hold floor.
    fn word_gap_for(&self, words: usize, duration: f64) -> f64 {
        if words < 2 {
            return 0.0;
        }
        let slots = (words - 1) as f64;
        let gap = self.word_gap.min(duration * MAX_GAP_SHARE / slots);
        if gap < self.smoother.min_hold() { 0.0 } else { gap }
    }

    /// Split a word's `share` among its units by letter count, optionally
    /// jittered. The returned spans always sum to `share`.
    ///
    /// Only units longer than the smoother's keep threshold are jittered, and
    /// none of them is moved below it, so jitter never changes which units
    /// survive smoothing. Offsets are zero-sum across the jittered units.
    fn unit_spans(&self, units: &[PhonemeUnit], share: f64, rng: Option<&mut StdRng>) -> Vec<f64> {
        let word_letters = letters(units) as f64;
        let mut spans: Vec<f64> = units
            .iter()
            .map(|u| share * u.chars as f64 / word_letters)
            .collect();

        let Some(rng) = rng else {
            return spans;
        };
        let keep = self.smoother.keep_threshold() + JITTER_MARGIN;
        let free: Vec<usize> = (0..spans.len()).filter(|&i| spans[i] > keep).collect();
        if free.len() < 2 {
            return spans;
        }

        let average = share / units.len() as f64;
        let mut offsets: Vec<f64> = free
            .iter()
            .map(|_| rng.gen_range(-self.jitter..=self.jitter) * average)
            .collect();
        let mean = offsets.iter().sum::<f64>() / offsets.len() as f64;
        for (offset, &i) in offsets.iter_mut().zip(&free) {
            *offset = (*offset - mean).max(keep - spans[i]);
        }

        // Clamping only raises offsets; take the surplus back from units with
        // room above the threshold, in proportion to that room.
        let surplus: f64 = offsets.iter().sum();
        if surplus > 0.0 {
            let room: Vec<f64> = offsets
                .iter()
                .zip(&free)
                .map(|(offset, &i)| spans[i] + offset - keep)
                .collect();
            let total_room: f64 = room.iter().sum();
            if total_room <= surplus {
                return spans;
            }
            for (offset, r) in offsets.iter_mut().zip(&room) {
                *offset -= surplus * r / total_room;
            }
        }

        for (offset, &i) in offsets.iter().zip(&free) {
            spans[i] += offset;
        }
        spans
    }
}

fn letters(units: &[PhonemeUnit]) -> usize {
    units.iter().map(|u| u.chars).sum()
}
