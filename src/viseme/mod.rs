//! Viseme mapping for lip-sync animation.
//!
//! A viseme is a visual mouth shape that corresponds to a phoneme (sound).
//! This module maps phonemes to the small sprite vocabulary the avatar
//! ships with and builds gap-free timelines of those shapes.

pub mod fallback;
pub mod phonemize;
pub mod segment;
pub mod smooth;
pub mod timeline;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use fallback::FallbackBuilder;
pub use phonemize::{clean_text, phonemize};
pub use segment::{PhonemeSegment, VisemeSegment};
pub use smooth::Smoother;
pub use timeline::{InvariantViolation, VisemeTimeline};

/// Label used for silence in phoneme timelines.
pub const SILENCE: &str = "SIL";

/// Mouth shapes available to the avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Viseme {
    /// Open jaw (/a/, /ʌ/, /h/).
    A,
    /// Spread lips, teeth close (/e/, sibilants, affricates, /θ/).
    E,
    /// Wide smile (/i/, /ɪ/, /j/).
    I,
    /// Rounded lips (/o/, /u/, /w/, /r/).
    O,
    /// Lips pressed together (/m/, /b/, /p/) and alveolar stops.
    M,
    /// Teeth on lower lip (/f/, /v/).
    FV,
    /// Tongue visible behind the teeth (/l/).
    L,
    /// Mouth closed at rest.
    #[serde(rename = "rest")]
    Rest,
}

impl Viseme {
    /// Wire name of this viseme.
    pub fn as_str(self) -> &'static str {
        match self {
            Viseme::A => "A",
            Viseme::E => "E",
            Viseme::I => "I",
            Viseme::O => "O",
            Viseme::M => "M",
            Viseme::FV => "FV",
            Viseme::L => "L",
            Viseme::Rest => "rest",
        }
    }
}

impl fmt::Display for Viseme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a phoneme label: drop position suffixes (`hh_B`), trailing
/// stress digits (`AH0`), and uppercase.
pub fn normalize_label(label: &str) -> String {
    let base = label.trim().split('_').next().unwrap_or_default();
    base.trim_end_matches(|c: char| c.is_ascii_digit())
        .to_ascii_uppercase()
}

/// `true` for labels that denote silence rather than a voiced sound.
pub fn is_silence(label: &str) -> bool {
    matches!(
        normalize_label(label).as_str(),
        "" | "SIL" | "SP" | "SPN" | "NSN"
    )
}

/// ARPABET phoneme to viseme mapping.
///
/// Accepts raw aligner labels (normalized here) as well as the coarse class
/// labels the heuristic phonemizer emits (`S`, `T`, `FV`). Unknown labels map
/// to [`Viseme::A`].
pub fn phoneme_to_viseme(phoneme: &str) -> Viseme {
    let p = normalize_label(phoneme);

    match p.as_str() {
        "" | "SIL" | "SP" | "SPN" | "NSN" => Viseme::Rest,

        // Open vowels, /h/, and velars
        "AA" | "AE" | "AH" | "AW" | "AY" | "HH" | "K" | "G" | "NG" => Viseme::A,

        // Mid front vowels, sibilants, affricates, dental fricatives
        "EH" | "EY" | "ER" | "S" | "Z" | "SH" | "ZH" | "CH" | "JH" | "TH" | "DH" => Viseme::E,

        // Close front vowels and the palatal glide
        "IY" | "IH" | "Y" => Viseme::I,

        // Back and rounded vowels, /w/, /r/
        "AO" | "OW" | "OY" | "UH" | "UW" | "W" | "R" => Viseme::O,

        // Bilabials, nasals, alveolar stops
        "M" | "B" | "P" | "EM" | "T" | "D" | "N" | "EN" | "NX" | "DX" => Viseme::M,

        // Labiodentals
        "F" | "V" | "FV" => Viseme::FV,

        // Lateral
        "L" | "EL" => Viseme::L,

        _ => Viseme::A,
    }
}
