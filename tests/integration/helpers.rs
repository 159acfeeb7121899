//! Shared helpers for integration tests.

use fae_lipsync::LipSyncConfig;
use fae_lipsync::config::AlignerConfig;
use fae_lipsync::viseme::Viseme;
use fae_lipsync::VisemeTimeline;
use wiremock::MockServer;

/// Minimum hold used by the default configuration, in seconds.
pub(crate) const DEFAULT_MIN_HOLD: f64 = 0.04;

/// Encode `secs` of 16 kHz mono 16-bit silence as WAV bytes.
pub(crate) fn silent_wav(secs: f64) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let frames = (secs * 16_000.0).round() as u32;
    let mut cursor = std::io::Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("create wav writer");
        for _ in 0..frames {
            writer.write_sample(0i16).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }
    cursor.into_inner()
}

/// Aligner config pointing at `server`'s `/transcriptions` with a short timeout.
pub(crate) fn aligner_config(server: &MockServer, timeout_ms: u64) -> AlignerConfig {
    AlignerConfig {
        endpoint_url: format!("{}/transcriptions", server.uri()),
        timeout_ms,
        ..AlignerConfig::default()
    }
}

/// Default config with jitter disabled and the aligner at `server`.
pub(crate) fn pipeline_config(server: &MockServer, timeout_ms: u64) -> LipSyncConfig {
    let mut config = LipSyncConfig::default();
    config.aligner = aligner_config(server, timeout_ms);
    config.fallback.jitter = 0.0;
    config
}

/// Visemes of a timeline in order.
pub(crate) fn shapes(timeline: &VisemeTimeline) -> Vec<Viseme> {
    timeline.iter().map(|segment| segment.viseme).collect()
}

/// Assert that `timeline` covers `[0, duration]` without gaps or overlaps.
pub(crate) fn assert_covers(timeline: &VisemeTimeline, duration: f64) {
    if let Err(violation) = timeline.check_invariants(DEFAULT_MIN_HOLD) {
        panic!("invariant violated: {violation} in {timeline:?}");
    }
    assert_eq!(timeline.duration(), duration);
    assert_eq!(timeline.segments().last().map(|s| s.end), Some(duration));
}
