//! Integration tests for page event handlers.

mod common;

use common::{FULL_RESULT, Reply, ScriptedTransport, guest_store, jpeg_candidate, signed_in_store};
use soilscan_app::{AppError, SubmissionState, Workflow};
use soilscan_stager::Candidate;

#[test]
fn workflow_tests_non_image_is_rejected_and_selection_kept() {
    let mut workflow = Workflow::new(guest_store(0), ScriptedTransport::new([]));
    workflow.select_file(jpeg_candidate()).expect("jpeg should stage");

    let error = workflow
        .select_file(Candidate::new("notes.pdf", "application/pdf", vec![0x25, 0x50]))
        .unwrap_err();

    assert!(matches!(&error, AppError::InvalidFileType { mime_type } if mime_type == "application/pdf"));
    assert_eq!(error.to_string(), "Please upload a valid soil image.");
    assert_eq!(
        workflow.stager().current().map(|image| image.file_name()),
        Some("field.jpg")
    );
}

#[test]
fn workflow_tests_stale_preview_is_discarded() {
    let mut workflow = Workflow::new(guest_store(0), ScriptedTransport::new([]));

    let first = workflow.select_file(jpeg_candidate()).expect("jpeg should stage");
    let second = workflow
        .select_file(Candidate::new("plot.png", "image/png", vec![0x89, 0x50, 0x4E, 0x47]))
        .expect("png should stage");

    assert!(!workflow.preview_ready(first.resolve()));
    assert!(!workflow.status().preview_ready);

    assert!(workflow.preview_ready(second.resolve()));
    let preview = workflow.stager().current().and_then(|image| image.preview());
    assert!(preview.is_some_and(|url| url.starts_with("data:image/png;base64,")));
}

#[test]
fn workflow_tests_preview_after_removal_is_discarded() {
    let mut workflow = Workflow::new(guest_store(0), ScriptedTransport::new([]));
    let ticket = workflow.select_file(jpeg_candidate()).expect("jpeg should stage");

    workflow.remove_image();

    assert!(!workflow.preview_ready(ticket.resolve()));
    assert!(workflow.stager().current().is_none());
    assert!(!workflow.status().submit.enabled);
}

#[test]
fn workflow_tests_remove_image_hides_results() {
    let transport = ScriptedTransport::new([Reply::Status(200, FULL_RESULT)]);
    let mut workflow = Workflow::new(guest_store(0), transport);
    workflow.select_file(jpeg_candidate()).expect("jpeg should stage");
    workflow.analyze(&mut |_| {}).expect("analysis should succeed");
    assert!(workflow.view().visible);

    workflow.remove_image();

    assert!(!workflow.view().visible);
    assert!(workflow.view().crops.is_empty());
    assert_eq!(workflow.status().staged_image, None);
}

#[test]
fn workflow_tests_status_projects_session_and_controls() {
    let workflow = Workflow::new(signed_in_store(3), ScriptedTransport::new([]));
    let status = workflow.status();

    assert_eq!(status.signed_in_as.as_deref(), Some("farmer"));
    assert_eq!(status.guest_scans_used, 3);
    assert_eq!(status.guest_scans_remaining, None);
    assert_eq!(status.submission, SubmissionState::Idle);
    assert!(!status.submit.enabled);
    assert_eq!(status.submit.label, "Analyze Soil Sample");

    let json = serde_json::to_value(&status).expect("status serializes");
    assert_eq!(json["guest_scan_limit"], 5);
    assert_eq!(json["submission"], "Idle");
}

#[test]
fn workflow_tests_guest_status_counts_down() {
    let mut workflow = Workflow::new(guest_store(2), ScriptedTransport::new([]));
    workflow.select_file(jpeg_candidate()).expect("jpeg should stage");

    let status = workflow.status();
    assert_eq!(status.signed_in_as, None);
    assert_eq!(status.guest_scans_remaining, Some(3));
    assert_eq!(status.staged_image.as_deref(), Some("field.jpg"));
    assert!(status.submit.enabled);
}
