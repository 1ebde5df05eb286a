// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for configuration module

use livecast::Config;
use livecast::backends::capture::{ConstraintTier, VideoConstraints};
use livecast::session::SessionOptions;
use std::time::Duration;

#[test]
fn test_config_default() {
    let config = Config::default();

    assert!(config.start_with_video, "Video should be on by default");
    assert!(config.start_with_audio, "Audio should be on by default");
    assert_eq!(config.toggle_debounce(), Duration::from_millis(500));
    assert_eq!(config.recovery_settle(), Duration::from_millis(500));
    assert_eq!(config.min_video_dimension, 100);
    assert_eq!(config.directory_limit, 20);
}

#[test]
fn test_default_cascade_has_five_tiers() {
    let config = Config::default();
    assert_eq!(config.cascade().len(), 5);
}

#[test]
fn test_empty_cascade_falls_back_to_standard() {
    let config = Config {
        cascade: Vec::new(),
        ..Config::default()
    };
    assert_eq!(config.cascade().len(), 5);
}

#[test]
fn test_save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.json");

    let config = Config {
        start_with_audio: false,
        operator: "Maison Lumen".to_string(),
        cascade: vec![ConstraintTier::new(0, "any", VideoConstraints::any())],
        ..Config::default()
    };
    config.save_to(&path).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_file_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, r#"{ "toggle_debounce_ms": 50 }"#).unwrap();

    let loaded = Config::load_from(&path).unwrap();
    assert_eq!(loaded.toggle_debounce(), Duration::from_millis(50));
    assert!(loaded.start_with_video);
    assert_eq!(loaded.cascade.len(), 5);
}

#[test]
fn test_malformed_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    std::fs::write(&path, "not json").unwrap();

    assert!(Config::load_from(&path).is_err());
}

#[test]
fn test_session_options_follow_config() {
    let config = Config {
        start_with_video: false,
        greet_on_go_live: false,
        recovery_settle_ms: 10,
        ..Config::default()
    };
    let options = SessionOptions::from_config(&config);

    assert!(!options.intent.video);
    assert!(options.intent.audio);
    assert!(!options.greet_on_go_live);
    assert_eq!(options.recovery_settle, Duration::from_millis(10));
}

#[test]
fn test_blank_operator_falls_back_to_default() {
    let config = Config {
        operator: "   ".to_string(),
        ..Config::default()
    };
    assert_eq!(SessionOptions::from_config(&config).operator, "Streamer");

    let config = Config {
        operator: "  Mina  ".to_string(),
        ..Config::default()
    };
    assert_eq!(SessionOptions::from_config(&config).operator, "Mina");
}
