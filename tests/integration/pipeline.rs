//! End-to-end scenarios for `LipSyncPipeline`.

use crate::helpers::{assert_covers, pipeline_config, shapes, silent_wav};
use fae_lipsync::viseme::Viseme;
use fae_lipsync::{LipSyncConfig, LipSyncPipeline, TimelineRequest, TimelineSource};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn offline_pipeline() -> LipSyncPipeline {
    let mut config = LipSyncConfig::default();
    config.aligner.enabled = false;
    config.fallback.jitter = 0.0;
    LipSyncPipeline::from_config(config).unwrap()
}

async fn mock_aligner(server: &MockServer, body: serde_json::Value, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/transcriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body).set_delay(delay))
        .mount(server)
        .await;
}

#[tokio::test]
async fn fallback_without_audio_spans_default_duration() {
    let result = offline_pipeline()
        .build_viseme_timeline("hello", None)
        .await
        .unwrap();

    assert_eq!(result.source, TimelineSource::Fallback);
    assert_covers(&result.timeline, 1.0);
    assert!(result.timeline.segments()[0].start.abs() < 1e-3);
    assert!(result.timeline.iter().any(|s| s.viseme != Viseme::Rest));
}

#[tokio::test]
async fn empty_text_with_hint_is_one_rest() {
    let request = TimelineRequest::new("").with_duration_hint(0.5);
    let result = offline_pipeline()
        .build_with(request, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(shapes(&result.timeline), [Viseme::Rest]);
    assert_covers(&result.timeline, 0.5);
}

#[tokio::test]
async fn disabled_aligner_falls_back_over_probed_duration() {
    let wav = silent_wav(1.5);
    let result = offline_pipeline()
        .build_viseme_timeline("good morning", Some(&wav))
        .await
        .unwrap();

    assert_eq!(result.source, TimelineSource::Fallback);
    assert_eq!(result.fallback_reason.as_deref(), Some("alignment disabled"));
    assert_covers(&result.timeline, 1.5);
}

#[tokio::test]
async fn aligned_timeline_is_clamped_to_audio() {
    let server = MockServer::start().await;
    mock_aligner(
        &server,
        serde_json::json!({"words": [{
            "case": "success",
            "alignedWord": "ma",
            "start": 0.2,
            "end": 1.4,
            "phones": [
                {"phone": "m_B", "duration": 0.3},
                {"phone": "aa_E", "duration": 0.9}
            ]
        }]}),
        Duration::ZERO,
    )
    .await;

    let pipeline = LipSyncPipeline::from_config(pipeline_config(&server, 2_000)).unwrap();
    let wav = silent_wav(1.0);
    let result = pipeline.build_viseme_timeline("ma", Some(&wav)).await.unwrap();

    assert_eq!(result.source, TimelineSource::Aligned);
    assert!(result.fallback_reason.is_none());
    assert_eq!(shapes(&result.timeline), [Viseme::Rest, Viseme::M, Viseme::A]);
    assert_covers(&result.timeline, 1.0);
}

#[tokio::test]
async fn not_found_word_still_yields_a_timeline() {
    let server = MockServer::start().await;
    mock_aligner(
        &server,
        serde_json::json!({"words": [{"case": "not-found-in-audio", "word": "hmm"}]}),
        Duration::ZERO,
    )
    .await;

    let pipeline = LipSyncPipeline::from_config(pipeline_config(&server, 2_000)).unwrap();
    let wav = silent_wav(0.8);
    let result = pipeline.build_viseme_timeline("hmm", Some(&wav)).await.unwrap();

    assert!(!result.timeline.is_empty());
    assert!(result.timeline.iter().any(|s| s.viseme == Viseme::Rest));
    assert_covers(&result.timeline, 0.8);
}

#[tokio::test]
async fn slow_aligner_times_out_to_fallback() {
    let server = MockServer::start().await;
    mock_aligner(&server, serde_json::json!({"words": []}), Duration::from_secs(5)).await;

    let pipeline = LipSyncPipeline::from_config(pipeline_config(&server, 200)).unwrap();
    let wav = silent_wav(1.0);

    let started = Instant::now();
    let result = pipeline.build_viseme_timeline("hello there", Some(&wav)).await.unwrap();

    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    assert_eq!(result.source, TimelineSource::Fallback);
    assert_eq!(result.fallback_reason.as_deref(), Some("aligner timed out"));
    assert_covers(&result.timeline, 1.0);
}

#[tokio::test]
async fn cancelled_turn_uses_fallback() {
    let server = MockServer::start().await;
    mock_aligner(&server, serde_json::json!({"words": []}), Duration::from_secs(5)).await;

    let pipeline = LipSyncPipeline::from_config(pipeline_config(&server, 10_000)).unwrap();
    let wav = silent_wav(0.6);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let request = TimelineRequest::new("see you").with_wav(&wav);
    let result = pipeline.build_with(request, &cancel).await.unwrap();

    assert_eq!(result.source, TimelineSource::Fallback);
    assert_eq!(result.fallback_reason.as_deref(), Some("alignment cancelled"));
    assert_covers(&result.timeline, 0.6);
}

#[tokio::test]
async fn concurrent_turns_are_independent() {
    let pipeline = Arc::new(offline_pipeline());
    let mut handles = Vec::new();
    for (i, text) in ["one", "two words", "and three words"].into_iter().enumerate() {
        let pipeline = Arc::clone(&pipeline);
        let secs = 0.5 + i as f64 * 0.5;
        handles.push(tokio::spawn(async move {
            let request = TimelineRequest::new(text).with_duration_hint(secs);
            let result = pipeline
                .build_with(request, &CancellationToken::new())
                .await
                .unwrap();
            (secs, result)
        }));
    }
    for handle in handles {
        let (secs, result) = handle.await.unwrap();
        assert_covers(&result.timeline, secs);
    }
}

#[tokio::test]
async fn result_serializes_for_transport() {
    let request = TimelineRequest::new("hi")
        .with_duration_hint(0.4)
        .with_emotion("happy");
    let result = offline_pipeline()
        .build_with(request, &CancellationToken::new())
        .await
        .unwrap();

    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["source"], "fallback");
    assert_eq!(json["emotion"], "happy");
    assert_eq!(json["fallback_reason"], "no audio");
    let segments = json["timeline"].as_array().unwrap();
    assert!(!segments.is_empty());
    for key in ["viseme", "start", "end", "confidence"] {
        assert!(segments[0].get(key).is_some(), "missing {key}");
    }
}
