//! Request and result types for the lip-sync pipeline.

use crate::viseme::VisemeTimeline;
use serde::Serialize;
use std::fmt;

/// Input for one chat turn.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimelineRequest<'a> {
    /// Reply text as spoken by the TTS engine.
    pub transcript: &'a str,
    /// Synthesized WAV bytes, if any audio was produced.
    pub wav: Option<&'a [u8]>,
    /// Duration reported by the TTS engine, used only when `wav` is absent.
    pub duration_hint: Option<f64>,
    /// Emotion tag from the chat reply, passed through to the result.
    pub emotion: Option<&'a str>,
}

impl<'a> TimelineRequest<'a> {
    /// Create a request for `transcript` with no audio.
    pub fn new(transcript: &'a str) -> Self {
        Self {
            transcript,
            ..Self::default()
        }
    }

    /// Attach synthesized audio.
    pub fn with_wav(mut self, wav: &'a [u8]) -> Self {
        self.wav = Some(wav);
        self
    }

    /// Attach a duration hint in seconds.
    pub fn with_duration_hint(mut self, secs: f64) -> Self {
        self.duration_hint = Some(secs);
        self
    }

    /// Attach the reply's emotion tag.
    pub fn with_emotion(mut self, emotion: &'a str) -> Self {
        self.emotion = Some(emotion);
        self
    }
}

/// Which path produced a timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimelineSource {
    /// Built from forced-alignment output.
    Aligned,
    /// Built heuristically from the text.
    Fallback,
}

impl fmt::Display for TimelineSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aligned => write!(f, "aligned"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Timeline for one turn, ready to serialize onto the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineResult {
    /// Gap-free viseme segments covering `[0, duration_seconds]`.
    pub timeline: VisemeTimeline,
    /// Path that produced the timeline. Informational only.
    pub source: TimelineSource,
    /// Audio duration the timeline covers.
    pub duration_seconds: f64,
    /// Why alignment was not used, when `source` is `fallback`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Emotion tag carried over from the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}
