//! Integration tests for the PI service lifecycle: polling timer, mode
//! switches, run-engine subscription and shutdown.

use alshub::config::HubConfig;
use alshub::notify::ChannelNotifier;
use alshub::reconcile::ReconcileOutcome;
use alshub::schedule::mock::{MockResponse, MockSchedule};
use alshub::schedule::PiRecord;
use alshub::{HubError, PiService, PiServiceHandle};
use std::sync::Arc;
use std::time::Duration;

fn create_test_config() -> HubConfig {
    let toml_str = r#"
        [schedule]
        endstation = "7.0.1.1"

        [service]
        poll_interval = "10s"
    "#;
    let mut config: HubConfig = toml::from_str(toml_str).expect("Failed to parse test config");
    config.service.session_path = None;
    config
}

fn start(config: &HubConfig, schedule: &Arc<MockSchedule>) -> PiServiceHandle {
    let (notifier, _notes) = ChannelNotifier::new();
    PiService::new(config, schedule.clone(), Arc::new(notifier))
        .expect("valid test config")
        .spawn()
}

#[tokio::test(start_paused = true)]
async fn test_apply_starts_and_manual_mode_stops_timer() {
    let schedule = Arc::new(MockSchedule::new(MockResponse::Empty));
    let handle = start(&create_test_config(), &schedule);

    handle.apply().await.unwrap();
    assert!(handle.status().await.unwrap().polling);
    assert_eq!(schedule.calls(), 1);

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(schedule.calls(), 4);

    handle.set_auto_pi(false).await.unwrap();
    assert!(!handle.status().await.unwrap().polling);

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(schedule.calls(), 4);

    handle.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_apply_in_manual_mode_does_not_poll() {
    let schedule = Arc::new(MockSchedule::new(MockResponse::Empty));
    let handle = start(&create_test_config(), &schedule);

    handle.set_auto_pi(false).await.unwrap();
    assert_eq!(
        handle.apply().await.unwrap(),
        ReconcileOutcome::Skipped
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(schedule.calls(), 0);
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_endstation_change_reconciles_for_new_endstation() {
    let schedule = Arc::new(MockSchedule::new(MockResponse::Empty));
    let handle = start(&create_test_config(), &schedule);

    schedule
        .push(MockResponse::Scheduled(PiRecord::new("B. Scientist", "bs@lab.org")))
        .await;
    let outcome = handle.set_endstation("8.3.2").await.unwrap();
    assert!(matches!(outcome, Some(ReconcileOutcome::Changed { .. })));

    let (endstation, _) = schedule.last_query().await.unwrap();
    assert_eq!(endstation, "8.3.2");
    assert_eq!(handle.status().await.unwrap().endstation, "8.3.2");

    // Same endstation again: nothing to do.
    assert_eq!(handle.set_endstation("8.3.2").await.unwrap(), None);
    assert_eq!(schedule.calls(), 1);

    assert!(matches!(
        handle.set_endstation("beamline 8").await,
        Err(HubError::Validation { .. })
    ));
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_run_engine_subscription_sees_changes() {
    let schedule = Arc::new(MockSchedule::always(PiRecord::new(
        "A. Researcher",
        "ar@lab.org",
    )));
    let handle = start(&create_test_config(), &schedule);
    let mut snapshots = handle.subscribe();

    handle.reconcile_now().await.unwrap();
    snapshots.changed().await.unwrap();
    assert_eq!(snapshots.borrow_and_update().pi, "ar@lab.org");

    handle.set_user_email("me@lab.org").await.unwrap();
    snapshots.changed().await.unwrap();
    let snapshot = snapshots.borrow_and_update().clone();
    assert_eq!(snapshot.user, "me@lab.org");
    assert!(!snapshot.pi_overridden);

    handle.set_auto_pi(false).await.unwrap();
    snapshots.changed().await.unwrap();
    assert!(snapshots.borrow_and_update().pi_overridden);

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_publication_disabled() {
    let mut config = create_test_config();
    config.service.subscribe_run_engine = false;

    let schedule = Arc::new(MockSchedule::always(PiRecord::new(
        "A. Researcher",
        "ar@lab.org",
    )));
    let handle = start(&config, &schedule);
    let snapshots = handle.subscribe();

    handle.reconcile_now().await.unwrap();
    assert!(!snapshots.has_changed().unwrap());
    assert_eq!(snapshots.borrow().pi, "");

    // The read model is still available on request.
    assert_eq!(handle.snapshot().await.unwrap().pi, "ar@lab.org");
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_export_session_respects_user_email_flag() {
    let schedule = Arc::new(MockSchedule::new(MockResponse::Empty));
    let handle = start(&create_test_config(), &schedule);

    handle.set_user_email("me@lab.org").await.unwrap();

    let without = handle.export_session(false).await.unwrap();
    assert_eq!(without.user_email, None);
    assert!(without.auto_pi);

    let with = handle.export_session(true).await.unwrap();
    assert_eq!(with.user_email.as_deref(), Some("me@lab.org"));
    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_dropping_all_handles_stops_service() {
    let schedule = Arc::new(MockSchedule::new(MockResponse::Empty));
    let handle = start(&create_test_config(), &schedule);
    let mut snapshots = handle.subscribe();

    drop(handle);

    // The sender lives in the actor; it is dropped when the task ends.
    assert!(snapshots.changed().await.is_err());
}

#[tokio::test]
async fn test_multiple_shutdown_calls() {
    let schedule = Arc::new(MockSchedule::new(MockResponse::Empty));
    let handle = start(&create_test_config(), &schedule);
    let clone = handle.clone();

    handle.shutdown().await.unwrap();
    clone.shutdown().await.unwrap();
    assert!(!clone.is_running());
    assert!(matches!(clone.status().await, Err(HubError::ServiceClosed)));
}

#[tokio::test]
async fn test_zero_poll_interval_rejected_at_construction() {
    let mut config = create_test_config();
    config.service.poll_interval = Duration::ZERO;

    let schedule = Arc::new(MockSchedule::new(MockResponse::Empty));
    let (notifier, _notes) = ChannelNotifier::new();
    let result = PiService::new(&config, schedule.clone(), Arc::new(notifier));

    match result {
        Err(HubError::Configuration(reason)) => assert!(reason.contains("poll_interval")),
        Err(other) => panic!("expected configuration error, got {other}"),
        Ok(_) => panic!("zero poll interval accepted"),
    }
    assert_eq!(schedule.calls(), 0);
}
