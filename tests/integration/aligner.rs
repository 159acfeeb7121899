//! Tests for `HttpAligner` against a mock alignment service.

use crate::helpers::{aligner_config, silent_wav};
use fae_lipsync::align::{AlignmentOutcome, HttpAligner, PhonemeAligner, UnavailableReason};
use fae_lipsync::config::AlignerConfig;
use fae_lipsync::viseme::PhonemeSegment;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

fn gentle_hi() -> serde_json::Value {
    serde_json::json!({
        "transcript": "hi",
        "words": [{
            "alignedWord": "hi",
            "case": "success",
            "start": 0.1,
            "end": 0.3,
            "word": "hi",
            "phones": [
                {"phone": "hh_B", "duration": 0.08},
                {"phone": "ay_E", "duration": 0.12}
            ]
        }]
    })
}

/// The body carries binary WAV data, so match on a lossy decode.
fn multipart_fields(request: &Request) -> bool {
    let body = String::from_utf8_lossy(&request.body);
    body.contains("name=\"audio\"")
        && body.contains("filename=\"speech.wav\"")
        && body.contains("name=\"transcript\"")
}

async fn align_with(server: &MockServer, timeout_ms: u64) -> AlignmentOutcome {
    let aligner = HttpAligner::new(aligner_config(server, timeout_ms));
    aligner
        .align(&silent_wav(0.5), "hi", &CancellationToken::new())
        .await
}

// ── Success ───────────────────────────────────────────────────────

#[tokio::test]
async fn test_align_success_posts_audio_and_transcript() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transcriptions"))
        .and(multipart_fields)
        .respond_with(ResponseTemplate::new(200).set_body_json(gentle_hi()))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = align_with(&server, 2_000).await;
    let labels: Vec<&str> = outcome.segments().iter().map(PhonemeSegment::label).collect();
    assert!(outcome.is_aligned(), "Expected Aligned, got: {outcome:?}");
    assert_eq!(labels, ["HH", "AY"]);
    assert!((outcome.segments()[1].end() - 0.3).abs() < 1e-9);
}

#[tokio::test]
async fn test_align_not_found_word_yields_silence() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "words": [{"case": "not-found-in-audio", "word": "hi"}]
        })))
        .mount(&server)
        .await;

    let outcome = align_with(&server, 2_000).await;
    let labels: Vec<&str> = outcome.segments().iter().map(PhonemeSegment::label).collect();
    assert_eq!(labels, ["SIL"]);
}

// ── Failures degrade to Unavailable ───────────────────────────────

#[tokio::test]
async fn test_align_500_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transcriptions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    match align_with(&server, 2_000).await {
        AlignmentOutcome::Unavailable(UnavailableReason::Http { status, message }) => {
            assert_eq!(status, 500);
            assert!(message.contains("Internal Server Error"));
        }
        other => panic!("Expected Http, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_align_timeout_is_bounded() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transcriptions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gentle_hi())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let started = Instant::now();
    let outcome = align_with(&server, 150).await;
    assert_eq!(outcome, AlignmentOutcome::Unavailable(UnavailableReason::Timeout));
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "timeout took {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn test_align_malformed_json_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let outcome = align_with(&server, 2_000).await;
    assert!(
        matches!(
            outcome,
            AlignmentOutcome::Unavailable(UnavailableReason::Malformed(_))
        ),
        "Expected Malformed, got: {outcome:?}"
    );
}

#[tokio::test]
async fn test_align_empty_word_list_is_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"words": []})))
        .mount(&server)
        .await;

    let outcome = align_with(&server, 2_000).await;
    assert_eq!(outcome, AlignmentOutcome::Unavailable(UnavailableReason::Empty));
}

#[tokio::test]
async fn test_align_connection_refused_is_not_running() {
    // Reserve a port, then release it so nothing is listening there.
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    let aligner = HttpAligner::new(AlignerConfig {
        endpoint_url: format!("http://127.0.0.1:{port}/transcriptions"),
        timeout_ms: 2_000,
        ..AlignerConfig::default()
    });
    let outcome = aligner
        .align(&silent_wav(0.2), "hi", &CancellationToken::new())
        .await;
    assert!(
        matches!(
            outcome,
            AlignmentOutcome::Unavailable(UnavailableReason::NotRunning | UnavailableReason::Transport(_))
        ),
        "Expected NotRunning, got: {outcome:?}"
    );
}

// ── Cancellation ──────────────────────────────────────────────────

#[tokio::test]
async fn test_align_cancel_mid_flight_returns_promptly() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/transcriptions"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(gentle_hi())
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    let aligner = HttpAligner::new(aligner_config(&server, 10_000));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let outcome = aligner.align(&silent_wav(0.2), "hi", &cancel).await;
    assert_eq!(outcome, AlignmentOutcome::Unavailable(UnavailableReason::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}
