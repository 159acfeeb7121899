//! Config file round-trips through TOML.

use fae_lipsync::LipSyncConfig;

#[test]
fn saved_config_loads_back_identically() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("nested").join("lipsync.toml");

    let mut config = LipSyncConfig::default();
    config.aligner.endpoint_url = "http://127.0.0.1:9000/align".to_owned();
    config.timeline.min_hold_ms = 60;
    config.fallback.seed = Some(7);
    config.save_to_file(&path).expect("save config");

    let loaded = LipSyncConfig::from_file(&path).expect("load config");
    assert_eq!(loaded.aligner.endpoint_url, config.aligner.endpoint_url);
    assert_eq!(loaded.timeline.min_hold_ms, 60);
    assert_eq!(loaded.fallback.seed, Some(7));
    assert!(loaded.validate().is_ok());
}

#[test]
fn partial_file_fills_in_defaults() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("lipsync.toml");
    std::fs::write(&path, "[aligner]\nenabled = false\n").expect("write config");

    let loaded = LipSyncConfig::from_file(&path).expect("load config");
    assert!(!loaded.aligner.enabled);
    assert_eq!(loaded.aligner.timeout_ms, 10_000);
    assert_eq!(loaded.timeline.merge_gap_ms, 30);
}
