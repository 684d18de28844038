use locutor::config::{LiveConfig, StudioConfig};
use locutor::error::ConfigError;

#[test]
fn test_defaults_match_transport_rates() {
    let config = StudioConfig::default();
    assert_eq!(config.output_sample_rate, 24_000);
    assert_eq!(config.subtitle.max_caption_chars, 60);
    assert_eq!(config.live.input_sample_rate, 16_000);
    assert_eq!(config.live.output_sample_rate, 24_000);
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_json_keeps_other_defaults() {
    let raw = r#"{ "subtitle": { "max_caption_chars": 42 }, "live": { "capture_frame_len": 1024 } }"#;
    let config = StudioConfig::from_json_str(raw).expect("partial config should parse");

    assert_eq!(config.subtitle.max_caption_chars, 42);
    assert_eq!(config.live.capture_frame_len, 1024);
    assert_eq!(config.live.input_sample_rate, 16_000);
    assert_eq!(config.output_sample_rate, 24_000);
}

#[test]
fn test_zero_values_are_rejected() {
    let err = StudioConfig::from_json_str(r#"{ "subtitle": { "max_caption_chars": 0 } }"#)
        .unwrap_err();
    assert!(
        matches!(err, ConfigError::Invalid { field: "subtitle.max_caption_chars", .. }),
        "got {:?}",
        err
    );

    let live = LiveConfig {
        input_sample_rate: 0,
        ..LiveConfig::default()
    };
    assert!(live.validate().is_err());
}

#[test]
fn test_malformed_json_is_a_parse_error() {
    let err = StudioConfig::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_outbound_mime_tag_follows_input_rate() {
    assert_eq!(LiveConfig::default().input_mime_type(), "audio/pcm;rate=16000");
    let custom = LiveConfig {
        input_sample_rate: 8_000,
        ..LiveConfig::default()
    };
    assert_eq!(custom.input_mime_type(), "audio/pcm;rate=8000");
}

#[test]
fn test_rates_above_hardware_range_are_rejected() {
    let err = StudioConfig::from_json_str(r#"{ "output_sample_rate": 3000000000 }"#).unwrap_err();
    assert!(
        matches!(err, ConfigError::Invalid { field: "output_sample_rate", .. }),
        "got {:?}",
        err
    );

    let err = StudioConfig::from_json_str(r#"{ "live": { "output_sample_rate": 384001 } }"#)
        .unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { field: "live.output_sample_rate", .. }));

    // Upper bound itself is fine
    assert!(StudioConfig::from_json_str(r#"{ "output_sample_rate": 384000 }"#).is_ok());
}
