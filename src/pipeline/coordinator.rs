//! Per-turn orchestrator choosing between the aligned and fallback paths.
//!
//! ```text
//! Start ─▶ ProbingDuration ─▶ Aligning ─┬─▶ Aligned ──────────▶ Smoothing ─────────┐
//!   │                                   └─▶ AlignmentFailed ─▶ FallbackBuilding ──┼─▶ Done
//!   └──────────────── (no audio / no speech) ──────────────▶ FallbackBuilding ──┘
//! ```
//!
//! The coordinator owns no per-turn state, so one instance can serve any
//! number of concurrent turns.

use super::messages::{TimelineRequest, TimelineResult, TimelineSource};
use crate::align::{AlignmentOutcome, HttpAligner, NoAligner, PhonemeAligner, UnavailableReason};
use crate::audio::probe_duration;
use crate::config::LipSyncConfig;
use crate::error::{LipSyncError, Result};
use crate::viseme::smooth::has_speech;
use crate::viseme::{FallbackBuilder, PhonemeSegment, Smoother, VisemeTimeline};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Stages of one turn. Each carries what the next stage needs.
enum Stage<'a> {
    Start,
    ProbingDuration {
        wav: &'a [u8],
    },
    Aligning {
        wav: &'a [u8],
        duration: f64,
    },
    Aligned {
        phonemes: Vec<PhonemeSegment>,
        duration: f64,
    },
    AlignmentFailed {
        reason: UnavailableReason,
        duration: f64,
    },
    Smoothing {
        phonemes: Vec<PhonemeSegment>,
        duration: f64,
    },
    FallbackBuilding {
        duration: f64,
        reason: String,
    },
    Done(TimelineResult),
}

impl Stage<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::ProbingDuration { .. } => "probing_duration",
            Self::Aligning { .. } => "aligning",
            Self::Aligned { .. } => "aligned",
            Self::AlignmentFailed { .. } => "alignment_failed",
            Self::Smoothing { .. } => "smoothing",
            Self::FallbackBuilding { .. } => "fallback_building",
            Self::Done(_) => "done",
        }
    }
}

/// Builds viseme timelines for chat turns.
pub struct LipSyncPipeline {
    config: LipSyncConfig,
    aligner: Arc<dyn PhonemeAligner>,
    smoother: Smoother,
    fallback: FallbackBuilder,
}

impl LipSyncPipeline {
    /// Create a pipeline with an explicit aligner backend.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Config`] if the configuration is invalid.
    pub fn new(config: LipSyncConfig, aligner: Arc<dyn PhonemeAligner>) -> Result<Self> {
        config.validate()?;
        let smoother = Smoother::new(&config.timeline);
        let fallback = FallbackBuilder::new(&config.timeline, &config.fallback);
        Ok(Self {
            config,
            aligner,
            smoother,
            fallback,
        })
    }

    /// Create a pipeline using the HTTP aligner, or no aligner when
    /// `aligner.enabled` is `false`.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::Config`] if the configuration is invalid.
    pub fn from_config(config: LipSyncConfig) -> Result<Self> {
        let aligner: Arc<dyn PhonemeAligner> = if config.aligner.enabled {
            Arc::new(HttpAligner::new(config.aligner.clone()))
        } else {
            Arc::new(NoAligner)
        };
        Self::new(config, aligner)
    }

    /// Build the timeline for `transcript` and its synthesized audio.
    ///
    /// # Errors
    ///
    /// Never fails for this input shape; the `Result` matches
    /// [`build_with`](Self::build_with).
    pub async fn build_viseme_timeline(
        &self,
        transcript: &str,
        wav: Option<&[u8]>,
    ) -> Result<TimelineResult> {
        let request = TimelineRequest {
            wav,
            ..TimelineRequest::new(transcript)
        };
        self.build_with(request, &CancellationToken::new()).await
    }

    /// Build the timeline for a full request.
    ///
    /// Cancelling `cancel` abandons an in-flight alignment and proceeds
    /// straight to the fallback path.
    ///
    /// # Errors
    ///
    /// Returns [`LipSyncError::InvalidInput`] for a negative or non-finite
    /// duration hint. Every other problem degrades to the fallback path.
    pub async fn build_with(
        &self,
        request: TimelineRequest<'_>,
        cancel: &CancellationToken,
    ) -> Result<TimelineResult> {
        if let Some(hint) = request.duration_hint
            && (!hint.is_finite() || hint < 0.0)
        {
            return Err(LipSyncError::InvalidInput(format!(
                "duration hint must be a non-negative number of seconds, got {hint}"
            )));
        }

        let mut stage = Stage::Start;
        loop {
            debug!(stage = stage.name(), "lip-sync stage");
            stage = match stage {
                Stage::Start => match request.wav {
                    Some(wav) if !wav.is_empty() => Stage::ProbingDuration { wav },
                    _ => Stage::FallbackBuilding {
                        duration: self.duration_without_audio(request.duration_hint),
                        reason: "no audio".to_owned(),
                    },
                },
                Stage::ProbingDuration { wav } => {
                    let duration = probe_duration(wav, &self.config.audio);
                    if has_speech_content(request.transcript) {
                        Stage::Aligning { wav, duration }
                    } else {
                        Stage::FallbackBuilding {
                            duration,
                            reason: "empty transcript".to_owned(),
                        }
                    }
                }
                Stage::Aligning { wav, duration } => {
                    debug!(aligner = self.aligner.name(), wav_bytes = wav.len(), "requesting alignment");
                    match self.aligner.align(wav, request.transcript, cancel).await {
                        AlignmentOutcome::Aligned(phonemes) => Stage::Aligned { phonemes, duration },
                        AlignmentOutcome::Unavailable(reason) => {
                            Stage::AlignmentFailed { reason, duration }
                        }
                    }
                }
                Stage::Aligned { phonemes, duration } => Stage::Smoothing { phonemes, duration },
                Stage::AlignmentFailed { reason, duration } => Stage::FallbackBuilding {
                    duration,
                    reason: reason.to_string(),
                },
                Stage::Smoothing { phonemes, duration } => {
                    let timeline = self.smoother.smooth(&phonemes, duration);
                    Stage::Done(self.finish(timeline, TimelineSource::Aligned, None, &request))
                }
                Stage::FallbackBuilding { duration, reason } => {
                    let timeline = self.fallback.build(request.transcript, duration);
                    Stage::Done(self.finish(
                        timeline,
                        TimelineSource::Fallback,
                        Some(reason),
                        &request,
                    ))
                }
                Stage::Done(result) => return Ok(result),
            };
        }
    }

    fn duration_without_audio(&self, hint: Option<f64>) -> f64 {
        hint.filter(|&secs| secs > 0.0)
            .unwrap_or(self.config.audio.default_duration_secs)
    }

    fn finish(
        &self,
        timeline: VisemeTimeline,
        source: TimelineSource,
        fallback_reason: Option<String>,
        request: &TimelineRequest<'_>,
    ) -> TimelineResult {
        debug_assert!(
            timeline.check_invariants(self.smoother.min_hold()).is_ok(),
            "timeline invariants violated: {:?}",
            timeline.check_invariants(self.smoother.min_hold())
        );
        let duration_seconds = timeline.duration();
        info!(
            source = %source,
            segments = timeline.len(),
            speech = has_speech(timeline.segments()),
            duration_secs = duration_seconds,
            reason = fallback_reason.as_deref().unwrap_or(""),
            "viseme timeline ready"
        );
        TimelineResult {
            timeline,
            source,
            duration_seconds,
            fallback_reason,
            emotion: request.emotion.map(str::to_owned),
        }
    }
}

/// `true` if `text` contains anything the phonemizer would voice.
fn has_speech_content(text: &str) -> bool {
    crate::viseme::clean_text(text)
        .chars()
        .any(char::is_alphanumeric)
}
