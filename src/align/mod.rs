//! Forced-alignment client.
//!
//! Sends the synthesized waveform and its transcript to an external aligner
//! and turns the reply into a phoneme timeline. Alignment is an optional
//! refinement: every failure (timeout, cancellation, connection refused,
//! HTTP error, unusable payload) is logged and reported as
//! [`AlignmentOutcome::Unavailable`], never as an error, so the caller can
//! fall back to the heuristic timeline.
//!
//! # Outcome model
//!
//! - [`Aligned`](AlignmentOutcome::Aligned): at least one usable phoneme
//! - [`Unavailable`](AlignmentOutcome::Unavailable): with an
//!   [`UnavailableReason`] for logs and metadata

pub mod response;

use crate::config::AlignerConfig;
use crate::viseme::PhonemeSegment;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use std::fmt;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Longest slice of an error body kept in [`UnavailableReason::Http`].
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Why alignment produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    /// Alignment is turned off in config.
    Disabled,
    /// The caller cancelled the turn.
    Cancelled,
    /// No response within the deadline.
    Timeout,
    /// Connection refused / unreachable.
    NotRunning,
    /// The service answered with an error status.
    Http {
        /// HTTP status code.
        status: u16,
        /// Start of the response body.
        message: String,
    },
    /// Any other transport failure.
    Transport(String),
    /// The body could not be interpreted.
    Malformed(String),
    /// The body parsed but held no usable segment.
    Empty,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "alignment disabled"),
            Self::Cancelled => write!(f, "alignment cancelled"),
            Self::Timeout => write!(f, "aligner timed out"),
            Self::NotRunning => write!(f, "aligner not running (connection refused)"),
            Self::Http { status, message } => write!(f, "aligner HTTP {status}: {message}"),
            Self::Transport(detail) => write!(f, "aligner transport error: {detail}"),
            Self::Malformed(detail) => write!(f, "malformed aligner response: {detail}"),
            Self::Empty => write!(f, "aligner returned no usable segments"),
        }
    }
}

/// Result of one alignment attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AlignmentOutcome {
    /// Non-empty, start-ordered phoneme timeline.
    Aligned(Vec<PhonemeSegment>),
    /// Nothing usable; the caller should fall back.
    Unavailable(UnavailableReason),
}

impl AlignmentOutcome {
    /// Returns `true` when segments are available.
    pub fn is_aligned(&self) -> bool {
        matches!(self, Self::Aligned(_))
    }

    /// Returns the segments, or an empty slice if unavailable.
    pub fn segments(&self) -> &[PhonemeSegment] {
        match self {
            Self::Aligned(segments) => segments,
            Self::Unavailable(_) => &[],
        }
    }
}

/// A source of phoneme timings for a waveform and its transcript.
#[async_trait]
pub trait PhonemeAligner: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Align `transcript` to `wav`.
    ///
    /// Implementations must return promptly once `cancel` fires.
    async fn align(&self, wav: &[u8], transcript: &str, cancel: &CancellationToken)
    -> AlignmentOutcome;
}

/// Aligner used when alignment is disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoAligner;

#[async_trait]
impl PhonemeAligner for NoAligner {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn align(&self, _wav: &[u8], _transcript: &str, _cancel: &CancellationToken) -> AlignmentOutcome {
        AlignmentOutcome::Unavailable(UnavailableReason::Disabled)
    }
}

/// Client for a Gentle-compatible HTTP alignment service.
///
/// Posts a multipart form with an `audio` file part and a `transcript`
/// text part, and normalizes the JSON reply with [`response::parse`].
pub struct HttpAligner {
    /// Aligner configuration.
    config: AlignerConfig,
    /// Shared HTTP client.
    client: reqwest::Client,
}

impl HttpAligner {
    /// Create a client with the given configuration.
    pub fn new(config: AlignerConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    async fn request(&self, wav: &[u8], transcript: &str) -> AlignmentOutcome {
        let audio = match Part::bytes(wav.to_vec())
            .file_name("speech.wav")
            .mime_str("audio/wav")
        {
            Ok(part) => part,
            Err(e) => return unavailable(classify_reqwest_error(&e)),
        };
        let form = Form::new()
            .part("audio", audio)
            .text("transcript", transcript.to_owned());

        let resp = match self
            .client
            .post(&self.config.endpoint_url)
            .multipart(form)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return unavailable(classify_reqwest_error(&e)),
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = if body.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                body.chars().take(MAX_ERROR_BODY_CHARS).collect()
            };
            return unavailable(UnavailableReason::Http {
                status: status.as_u16(),
                message,
            });
        }

        match resp.text().await {
            Ok(body) => response::parse(&body, self.config.default_phone_secs()),
            Err(e) => unavailable(classify_reqwest_error(&e)),
        }
    }
}

#[async_trait]
impl PhonemeAligner for HttpAligner {
    fn name(&self) -> &str {
        "http"
    }

    async fn align(&self, wav: &[u8], transcript: &str, cancel: &CancellationToken) -> AlignmentOutcome {
        let deadline = Duration::from_millis(self.config.timeout_ms);
        let started = Instant::now();

        // Dropping the request future aborts the HTTP call.
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => unavailable(UnavailableReason::Cancelled),
            result = tokio::time::timeout(deadline, self.request(wav, transcript)) => {
                result.unwrap_or_else(|_| unavailable(UnavailableReason::Timeout))
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            AlignmentOutcome::Aligned(segments) => info!(
                endpoint = self.config.endpoint_url.as_str(),
                segments = segments.len(),
                elapsed_ms,
                "forced alignment succeeded"
            ),
            AlignmentOutcome::Unavailable(reason) => warn!(
                endpoint = self.config.endpoint_url.as_str(),
                elapsed_ms,
                reason = %reason,
                "forced alignment unavailable"
            ),
        }
        outcome
    }
}

fn unavailable(reason: UnavailableReason) -> AlignmentOutcome {
    AlignmentOutcome::Unavailable(reason)
}

/// Classify a reqwest error into an [`UnavailableReason`].
fn classify_reqwest_error(err: &reqwest::Error) -> UnavailableReason {
    if err.is_timeout() {
        UnavailableReason::Timeout
    } else if err.is_connect() {
        UnavailableReason::NotRunning
    } else if err.is_decode() {
        UnavailableReason::Malformed(err.to_string())
    } else {
        UnavailableReason::Transport(err.to_string())
    }
}
