//! Deployment state derivation tests over platform payloads

use netbox_deploy::deploy::fsm::{derive_state, DeploymentState, LogView, SetupProgress, UNKNOWN_ERROR};
use platform_models::{AppSetup, Status};
use serde_json::json;

use crate::fixtures::setup;

fn parse(value: serde_json::Value) -> AppSetup {
    serde_json::from_value(value).unwrap()
}

#[test]
fn test_state_sequence_of_a_successful_setup() {
    let records = [
        setup(Status::Pending, None),
        setup(Status::Pending, Some(Status::Pending)),
        setup(Status::Pending, Some(Status::Succeeded)),
        setup(Status::Succeeded, Some(Status::Succeeded)),
    ];

    let states: Vec<_> = records.iter().map(derive_state).collect();
    assert_eq!(
        states,
        vec![
            DeploymentState::Initializing,
            DeploymentState::Building,
            DeploymentState::Releasing,
            DeploymentState::Finished,
        ]
    );
    assert!(!states[..3].iter().any(DeploymentState::is_terminal));
    assert!(states[3].is_terminal());
}

#[test]
fn test_state_depends_only_on_latest_record() {
    // A failed record followed by a pending one is not sticky
    let failed = setup(Status::Failed, None);
    let pending = setup(Status::Pending, Some(Status::Pending));
    assert!(derive_state(&failed).is_terminal());
    assert_eq!(derive_state(&pending), DeploymentState::Building);
}

#[test]
fn test_platform_payloads() {
    let record = parse(json!({
        "id": "a1b2",
        "status": "pending",
        "app": {"id": "app-1", "name": "my-netbox"},
        "build": {"id": "b1", "status": "pending", "output_stream_url": "https://build-output.example/b1"},
        "failure_message": null,
        "resolved_success_url": null,
        "created_at": "2020-01-01T10:00:00Z",
    }));
    assert_eq!(derive_state(&record), DeploymentState::Building);
    assert_eq!(
        LogView::from_setup(&record),
        Some(LogView {
            url: "https://build-output.example/b1".to_string(),
            follow: true,
        })
    );

    let record = parse(json!({
        "id": "a1b2",
        "status": "failed",
        "build": {"id": "b1", "status": "failed"},
        "failure_message": "Couldn't find heroku.yml",
    }));
    assert_eq!(
        derive_state(&record),
        DeploymentState::Failed("Couldn't find heroku.yml".to_string())
    );

    let record = parse(json!({"id": "a1b2", "status": "failed"}));
    assert_eq!(derive_state(&record).failure_message(), Some(UNKNOWN_ERROR));
}

#[test]
fn test_unknown_status_is_not_terminal() {
    let record = parse(json!({"id": "a1b2", "status": "canceled"}));
    assert_eq!(record.status, Status::Unknown);
    assert_eq!(derive_state(&record), DeploymentState::Loading);
}

#[test]
fn test_progress_of_finished_setup() {
    let progress = SetupProgress::from_setup(&setup(Status::Succeeded, Some(Status::Succeeded)));
    let symbols: Vec<_> = progress.steps().iter().map(|(_, step)| step.symbol()).collect();
    assert_eq!(symbols, vec!["✅", "✅", "✅"]);
}

#[test]
fn test_state_serialization() {
    let failed = serde_json::to_value(DeploymentState::Failed("boom".to_string())).unwrap();
    assert_eq!(failed, json!({"state": "failed", "message": "boom"}));

    let building = serde_json::to_value(DeploymentState::Building).unwrap();
    assert_eq!(building, json!({"state": "building"}));
}
