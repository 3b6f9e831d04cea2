use sbprobe::config::{ConfigError, DEFAULT_LEAD_KEYWORDS};
use sbprobe::ProbeConfig;

#[test]
fn test_defaults() {
    let config = ProbeConfig::default();

    assert_eq!(config.max_stack_frames, 12);
    assert!(config.dedupe_traces);
    assert_eq!(config.submit_event_type, "submit");
    assert_eq!(config.form_marker.attribute, "data-form");
    assert_eq!(config.form_marker.value, "multistep");
    assert_eq!(config.all_lead_keywords().len(), DEFAULT_LEAD_KEYWORDS.len());
    assert!(config.validate().is_ok());
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config = ProbeConfig::from_json_str(r#"{ "max_stack_frames": 4, "extra_lead_keywords": ["HubSpot"] }"#).unwrap();

    assert_eq!(config.max_stack_frames, 4);
    assert_eq!(config.activation_path, "/schnellbewerbung/sb-sandbox");
    assert!(config.all_lead_keywords().contains(&"hubspot".to_string()));
}

#[test]
fn test_invalid_threshold_rejected() {
    let err = ProbeConfig::from_json_str(r#"{ "lead_keywords": ["lead"], "min_keyword_matches": 2 }"#).unwrap_err();

    assert!(matches!(err, ConfigError::Invalid { field: "min_keyword_matches", .. }));
}

#[test]
fn test_malformed_json_rejected() {
    let err = ProbeConfig::from_json_str("{ not json").unwrap_err();

    assert!(matches!(err, ConfigError::Parse(_)));
}
