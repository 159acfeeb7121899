//! Normalization of forced-aligner responses into phoneme segments.
//!
//! Two families of JSON are accepted:
//!
//! - **Word lists** (Gentle and similar): `{"words": [...]}` where each word
//!   has `start`/`end`, a `case`, and a nested `phones` (or `phonemes`)
//!   list. Phones usually carry only a `duration` and are laid end to end
//!   from the word start.
//! - **Flat phoneme lists**: `{"phonemes": [...]}`, `{"segments": [...]}`,
//!   or a bare array of `{label, start, end | duration}` objects.
//!
//! Entries that cannot be interpreted are skipped one at a time. Only an
//! input with no usable entry at all is reported as unavailable.

use super::{AlignmentOutcome, UnavailableReason};
use crate::viseme::phonemize::phonemize_units;
use crate::viseme::segment::{ALIGNED_CONFIDENCE, HEURISTIC_CONFIDENCE};
use crate::viseme::{PhonemeSegment, SILENCE};
use serde_json::Value;
use tracing::debug;

const LABEL_KEYS: &[&str] = &["phone", "phoneme", "label"];
const CONFIDENCE_KEYS: &[&str] = &["confidence", "score"];
const NOT_FOUND_CASES: &[&str] = &["not-found-in-audio", "not-found"];
/// Audio the transcript did not mention. These entries carry their own span.
const UNTRANSCRIBED_CASE: &str = "not-found-in-transcript";

/// Parse a response body.
pub fn parse(body: &str, default_phone: f64) -> AlignmentOutcome {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => normalize(&json, default_phone),
        Err(e) => AlignmentOutcome::Unavailable(UnavailableReason::Malformed(format!(
            "response is not JSON: {e}"
        ))),
    }
}

/// Normalize an already-decoded response.
pub fn normalize(json: &Value, default_phone: f64) -> AlignmentOutcome {
    let segments = if let Some(words) = json.get("words").and_then(Value::as_array) {
        from_words(words, default_phone)
    } else if let Some(flat) = ["phonemes", "segments", "phones"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_array))
    {
        from_flat(flat, default_phone)
    } else if let Some(entries) = json.as_array() {
        if entries.iter().any(is_word_entry) {
            from_words(entries, default_phone)
        } else {
            from_flat(entries, default_phone)
        }
    } else {
        return AlignmentOutcome::Unavailable(UnavailableReason::Malformed(
            "unrecognized response shape".into(),
        ));
    };

    if segments.is_empty() {
        AlignmentOutcome::Unavailable(UnavailableReason::Empty)
    } else {
        AlignmentOutcome::Aligned(segments)
    }
}

fn is_word_entry(entry: &Value) -> bool {
    ["phones", "phonemes", "case", "alignedWord"]
        .iter()
        .any(|key| entry.get(*key).is_some())
}

fn from_words(words: &[Value], default_phone: f64) -> Vec<PhonemeSegment> {
    let mut out = Vec::new();
    let mut cursor = 0.0_f64;
    let mut skipped = 0usize;

    for word in words {
        if !word.is_object() {
            skipped += 1;
            continue;
        }

        let case = word.get("case").and_then(Value::as_str).unwrap_or("success");
        if NOT_FOUND_CASES.contains(&case) {
            // Keep the cursor moving so later words still line up.
            if let Some(seg) = PhonemeSegment::new(SILENCE, cursor, cursor + default_phone, 1.0) {
                cursor = seg.end();
                out.push(seg);
            }
            continue;
        }

        let word_start = number(word, "start");
        let word_end = number(word, "end");
        if case == UNTRANSCRIBED_CASE {
            let span = word_start.zip(word_end);
            match span.and_then(|(start, end)| PhonemeSegment::new(SILENCE, start, end, 1.0)) {
                Some(seg) => {
                    cursor = cursor.max(seg.end());
                    out.push(seg);
                }
                None => skipped += 1,
            }
            continue;
        }
        let word_confidence = first_number(word, CONFIDENCE_KEYS).map(|c| c as f32);
        let phones = word
            .get("phones")
            .or_else(|| word.get("phonemes"))
            .and_then(Value::as_array)
            .filter(|list| !list.is_empty());

        let before = out.len();
        match phones {
            Some(phones) => {
                let mut phone_cursor = word_start.unwrap_or(cursor);
                for (i, phone) in phones.iter().enumerate() {
                    let next_start = phones.get(i + 1).and_then(|p| number(p, "start"));
                    let Some(seg) = phone_segment(
                        phone,
                        phone_cursor,
                        next_start,
                        default_phone,
                        word_confidence,
                    ) else {
                        skipped += 1;
                        continue;
                    };
                    phone_cursor = seg.end();
                    out.push(seg);
                }
            }
            None => {
                if let (Some(start), Some(end)) = (word_start, word_end) {
                    let text = word
                        .get("alignedWord")
                        .or_else(|| word.get("word"))
                        .and_then(Value::as_str)
                        .unwrap_or_default();
                    out.extend(spread_word(text, start, end));
                }
            }
        }

        if out.len() == before {
            skipped += 1;
        }
        if let Some(last) = out.last() {
            cursor = cursor.max(last.end());
        }
    }

    if skipped > 0 {
        debug!(skipped, kept = out.len(), "skipped malformed aligner entries");
    }
    out
}

fn from_flat(entries: &[Value], default_phone: f64) -> Vec<PhonemeSegment> {
    let mut out = Vec::new();
    let mut cursor = 0.0_f64;
    let mut skipped = 0usize;

    for (i, entry) in entries.iter().enumerate() {
        let next_start = entries.get(i + 1).and_then(|p| number(p, "start"));
        match phone_segment(entry, cursor, next_start, default_phone, None) {
            Some(seg) => {
                cursor = seg.end();
                out.push(seg);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, kept = out.len(), "skipped malformed aligner entries");
    }
    out
}

/// Interpret one phone entry.
///
/// `start` defaults to `cursor`. `end` is taken from `end`, else
/// `start + duration`, else the next entry's start, else
/// `start + default_phone`.
fn phone_segment(
    phone: &Value,
    cursor: f64,
    next_start: Option<f64>,
    default_phone: f64,
    word_confidence: Option<f32>,
) -> Option<PhonemeSegment> {
    let label = LABEL_KEYS
        .iter()
        .find_map(|key| phone.get(*key).and_then(Value::as_str))?;
    let start = number(phone, "start").unwrap_or(cursor);
    let end = number(phone, "end")
        .or_else(|| number(phone, "duration").map(|d| start + d))
        .or(next_start.filter(|&next| next > start))
        .unwrap_or(start + default_phone);
    let confidence = first_number(phone, CONFIDENCE_KEYS)
        .map(|c| c as f32)
        .or(word_confidence)
        .unwrap_or(ALIGNED_CONFIDENCE);
    PhonemeSegment::new(label, start, end, confidence)
}

/// Spread a word that was aligned without a phone breakdown evenly over its
/// span, using the heuristic phonemizer for the labels.
fn spread_word(text: &str, start: f64, end: f64) -> Vec<PhonemeSegment> {
    let units = phonemize_units(text);
    let letters: usize = units.iter().map(|u| u.chars).sum();
    if units.is_empty() || end <= start {
        return Vec::new();
    }

    let span = end - start;
    let mut cursor = start;
    let mut out = Vec::with_capacity(units.len());
    for (i, unit) in units.iter().enumerate() {
        let unit_end = if i + 1 == units.len() {
            end
        } else {
            cursor + span * unit.chars as f64 / letters as f64
        };
        if let Some(seg) = PhonemeSegment::new(unit.label, cursor, unit_end, HEURISTIC_CONFIDENCE) {
            out.push(seg);
        }
        cursor = unit_end;
    }
    out
}

fn number(value: &Value, key: &str) -> Option<f64> {
    value.get(key).and_then(Value::as_f64)
}

fn first_number(value: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| number(value, key))
}
