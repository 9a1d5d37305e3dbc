//! Integration tests for end-to-end analysis scenarios.

mod common;

use common::{FULL_RESULT, Reply, ScriptedTransport, guest_store, jpeg_candidate, signed_in_store, stored_count};
use soilscan_app::{AppError, SubmissionPath, SubmissionState, SubmitError, Workflow};
use soilscan_upload::IMAGE_FIELD;

#[test]
fn analysis_scenario_tests_guest_success_renders_every_slot() {
    let store = guest_store(0);
    let transport = ScriptedTransport::new([Reply::Status(200, FULL_RESULT)]);
    let mut workflow = Workflow::new(store.clone(), transport.clone());

    workflow.select_file(jpeg_candidate()).expect("jpeg should stage");
    let submission = workflow.analyze(&mut |_| {}).expect("analysis should succeed");

    assert_eq!(submission.path, SubmissionPath::Anonymous);
    assert_eq!(submission.guest_scans_used, Some(1));
    assert_eq!(stored_count(store.as_ref()).as_deref(), Some("1"));
    assert_eq!(workflow.orchestrator().state(), SubmissionState::Succeeded);

    let view = workflow.view();
    assert!(view.visible);
    assert_eq!(view.soil_type, "Loamy (92%)");
    assert_eq!(view.health_score, "78");
    assert_eq!(view.ph_range, "5.5 - 6.8");
    assert_eq!(view.salinity, "0.4 dS/m");
    assert_eq!(view.climate_zone, "Temperate");
    assert_eq!(view.deficiencies, "Phosphorus, Zinc");
    assert_eq!(view.fertilizer, "NPK 10-26-26");
    assert_eq!(view.crops, ["Wheat", "Maize", "Soybean"]);

    let nutrients: Vec<_> = view
        .micronutrients
        .iter()
        .map(|row| (row.name.as_str(), row.value.as_str()))
        .collect();
    assert_eq!(nutrients, [("Zinc", "Low"), ("Iron", "Adequate"), ("Boron", "0.5")]);
    assert!(view.rows().iter().all(|(_, value)| !value.is_empty()));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].file_name, "field.jpg");
    assert_eq!(requests[0].mime_type, "image/jpeg");
    assert!(requests[0].bearer_token.is_none());
    assert_eq!(IMAGE_FIELD, "image");
}

#[test]
fn analysis_scenario_tests_authenticated_success_leaves_counter() {
    let store = signed_in_store(2);
    let transport = ScriptedTransport::new([Reply::Status(200, FULL_RESULT)]);
    let mut workflow = Workflow::new(store.clone(), transport.clone());

    workflow.select_file(jpeg_candidate()).expect("jpeg should stage");
    let submission = workflow.analyze(&mut |_| {}).expect("analysis should succeed");

    assert_eq!(submission.path, SubmissionPath::Authenticated);
    assert_eq!(submission.guest_scans_used, None);
    assert_eq!(stored_count(store.as_ref()).as_deref(), Some("2"));
    assert_eq!(transport.requests()[0].bearer_token.as_deref(), Some("tok-123"));
}

#[test]
fn analysis_scenario_tests_server_detail_is_surfaced_and_image_kept() {
    let store = guest_store(0);
    let transport = ScriptedTransport::new([
        Reply::Status(500, r#"{"detail":"model unavailable"}"#),
        Reply::Status(200, FULL_RESULT),
    ]);
    let mut workflow = Workflow::new(store.clone(), transport.clone());
    workflow.select_file(jpeg_candidate()).expect("jpeg should stage");

    let error = workflow.analyze(&mut |_| {}).unwrap_err();
    match &error {
        AppError::Submit(SubmitError::RequestFailed { message }) => {
            assert_eq!(message, "model unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(error.to_string(), "model unavailable");
    assert_eq!(workflow.orchestrator().state(), SubmissionState::FailedRetryable);
    assert!(workflow.stager().current().is_some());
    assert!(!workflow.view().visible);
    assert_eq!(workflow.status().submit.label, "Retry Analysis");
    assert_eq!(stored_count(store.as_ref()).as_deref(), Some("0"));

    // Same staged image, no reselection.
    workflow.analyze(&mut |_| {}).expect("retry should succeed");
    assert_eq!(transport.request_count(), 2);
    assert_eq!(stored_count(store.as_ref()).as_deref(), Some("1"));
}

#[test]
fn analysis_scenario_tests_unparseable_body_is_generic_failure() {
    let transport = ScriptedTransport::new([Reply::Status(200, "<html>oops</html>")]);
    let mut workflow = Workflow::new(guest_store(0), transport);
    workflow.select_file(jpeg_candidate()).expect("jpeg should stage");

    let error = workflow.analyze(&mut |_| {}).unwrap_err();
    assert_eq!(error.to_string(), "Analysis failed");
}

#[test]
fn analysis_scenario_tests_transport_failure_is_retryable() {
    let transport = ScriptedTransport::new([Reply::Error(
        soilscan_upload::UploadError::Timeout,
    )]);
    let mut workflow = Workflow::new(guest_store(0), transport);
    workflow.select_file(jpeg_candidate()).expect("jpeg should stage");

    match workflow.analyze(&mut |_| {}).unwrap_err() {
        AppError::Submit(error) => {
            assert!(error.is_retryable());
            assert_eq!(error.to_string(), "analysis request timed out");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(workflow.stager().current().is_some());
}
