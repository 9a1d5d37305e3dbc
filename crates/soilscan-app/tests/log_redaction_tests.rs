//! Integration tests for log redaction.

use soilscan_app::redact_sensitive;

#[test]
fn log_redaction_tests_removes_obvious_secret_markers() {
    let raw = "authorization=Bearer abc123";
    let redacted = redact_sensitive(raw);

    assert!(redacted.contains("<redacted>"));
    assert!(!redacted.contains("abc123"));
}

#[test]
fn log_redaction_tests_request_debug_hides_token() {
    let request = soilscan_upload::AnalysisRequest {
        file_name: "field.jpg".to_string(),
        mime_type: "image/jpeg".to_string(),
        bytes: vec![1_u8, 2, 3].into(),
        bearer_token: Some("tok-secret".to_string()),
    };

    let debug = format!("{request:?}");
    assert!(!debug.contains("tok-secret"));
}
