//! Leave racing a pending join
//!
//! Each collaborator is held behind a [`Gate`] so `leave()` lands at a known
//! step of the join. Whatever the step produced must be released exactly once
//! and the coordinator must end up `Idle`.

mod common;

use classlive_core::sim::{Gate, LoopbackHub, SimulatedDevices, StaticCredentialFetcher};
use classlive_core::{
    ConnectError, ConnectionState, EndReason, JoinError, JoinResult, JoinOutcome,
    LiveSessionEvent, SessionCoordinator, SessionId,
};
use tokio::task::JoinHandle;

use common::{bounded, drain_events, eventually, next_event, wait_for_state, Harness};

fn spawn_join(coordinator: &SessionCoordinator) -> JoinHandle<JoinResult<JoinOutcome>> {
    let coordinator = coordinator.clone();
    tokio::spawn(async move { coordinator.join(SessionId::from("room-1")).await })
}

fn spawn_leave(coordinator: &SessionCoordinator) -> JoinHandle<()> {
    let coordinator = coordinator.clone();
    tokio::spawn(async move { coordinator.leave().await })
}

#[tokio::test]
async fn test_leave_during_credential_fetch() {
    let gate = Gate::closed();
    let harness = Harness::with(
        LoopbackHub::new(),
        SimulatedDevices::new(),
        StaticCredentialFetcher::new("token-1").with_gate(gate.clone()),
    );
    let coordinator = &harness.coordinator;
    let mut events = coordinator.events();

    let joining = spawn_join(coordinator);
    bounded("fetch pending", gate.until_waiting(1)).await;
    assert_eq!(coordinator.state(), ConnectionState::FetchingCredential);
    assert!(coordinator.pending_join().is_some());

    let leaving = spawn_leave(coordinator);
    eventually("teardown requested", || coordinator.is_tearing_down()).await;
    assert_eq!(coordinator.state(), ConnectionState::FetchingCredential);

    gate.open();
    let result = bounded("join settles", joining).await.unwrap();
    assert_eq!(result.unwrap_err(), JoinError::Aborted);
    bounded("leave returns", leaving).await.unwrap();

    assert_eq!(coordinator.state(), ConnectionState::Idle);
    assert!(!coordinator.is_tearing_down());
    assert!(coordinator.pending_join().is_none());
    assert_eq!(harness.hub.stats().connect_calls, 0);
    assert_eq!(harness.devices.open_attempts(), 0);

    let ended = next_event(&mut events, |e| matches!(e, LiveSessionEvent::SessionEnded { .. })).await;
    if let LiveSessionEvent::SessionEnded { reason, .. } = ended {
        assert_eq!(reason, EndReason::UserLeft);
    }
}

#[tokio::test]
async fn test_leave_during_media_acquisition() {
    let gate = Gate::closed();
    let harness = Harness::with(
        LoopbackHub::new(),
        SimulatedDevices::new().with_gate(gate.clone()),
        StaticCredentialFetcher::new("token-1"),
    );
    let coordinator = &harness.coordinator;

    let joining = spawn_join(coordinator);
    bounded("both devices pending", gate.until_waiting(2)).await;
    assert_eq!(coordinator.state(), ConnectionState::AcquiringMedia);

    let leaving = spawn_leave(coordinator);
    eventually("teardown requested", || coordinator.is_tearing_down()).await;

    gate.open();
    let result = bounded("join settles", joining).await.unwrap();
    assert_eq!(result.unwrap_err(), JoinError::Aborted);
    bounded("leave returns", leaving).await.unwrap();

    assert_eq!(coordinator.state(), ConnectionState::Idle);
    // The devices opened after leave() and were still closed
    assert_eq!(harness.devices.open_count(), 2);
    assert_eq!(harness.devices.live_count(), 0);
    assert_eq!(coordinator.media_stats().release_calls, 1);

    let hub = harness.hub.stats();
    assert_eq!(hub.publish_calls, 0);
    assert_eq!(hub.leave_calls, 1);
    assert!(!harness.hub.is_connected());
}

#[tokio::test]
async fn test_leave_during_connect_waits_for_connect_to_settle() {
    let gate = Gate::closed();
    let harness = Harness::with(
        LoopbackHub::new().with_connect_gate(gate.clone()),
        SimulatedDevices::new(),
        StaticCredentialFetcher::new("token-1"),
    );
    let coordinator = &harness.coordinator;

    let joining = spawn_join(coordinator);
    bounded("connect pending", gate.until_waiting(1)).await;
    wait_for_state(coordinator, ConnectionState::Connecting).await;

    let leaving = spawn_leave(coordinator);
    eventually("teardown requested", || coordinator.is_tearing_down()).await;

    // Nothing is torn down under a pending connect
    tokio::task::yield_now().await;
    assert_eq!(harness.hub.stats().leave_calls, 0);
    assert_eq!(harness.devices.live_count(), 2);
    assert_eq!(coordinator.state(), ConnectionState::Connecting);

    gate.open();
    let result = bounded("join settles", joining).await.unwrap();
    assert_eq!(result.unwrap_err(), JoinError::Aborted);
    bounded("leave returns", leaving).await.unwrap();

    let hub = harness.hub.stats();
    assert_eq!(hub.connects, 1);
    assert_eq!(hub.publish_calls, 0);
    assert_eq!(hub.leave_calls, 1);
    assert_eq!(hub.disconnects, 1);
    assert!(!harness.hub.has_event_handlers());
    assert_eq!(harness.devices.live_count(), 0);
    assert_eq!(coordinator.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_leave_wins_over_a_failing_connect() {
    let gate = Gate::closed();
    let harness = Harness::with(
        LoopbackHub::new().with_connect_gate(gate.clone()),
        SimulatedDevices::new(),
        StaticCredentialFetcher::new("token-1"),
    );
    harness.hub.fail_next_connect(ConnectError::network("timed out"));
    let coordinator = &harness.coordinator;
    let mut events = coordinator.events();

    let joining = spawn_join(coordinator);
    bounded("connect pending", gate.until_waiting(1)).await;
    let leaving = spawn_leave(coordinator);
    eventually("teardown requested", || coordinator.is_tearing_down()).await;

    gate.open();
    let result = bounded("join settles", joining).await.unwrap();
    assert_eq!(result.unwrap_err(), JoinError::Aborted);
    bounded("leave returns", leaving).await.unwrap();

    assert_eq!(coordinator.state(), ConnectionState::Idle);
    assert_eq!(harness.devices.live_count(), 0);
    assert_eq!(harness.hub.stats().leave_calls, 1);

    // Reported as a leave, not as a failed join
    let seen = drain_events(&mut events).await;
    assert!(!seen
        .iter()
        .any(|e| matches!(e, LiveSessionEvent::JoinFailed { .. })));
    assert!(seen.iter().any(|e| matches!(
        e,
        LiveSessionEvent::SessionEnded {
            reason: EndReason::UserLeft,
            ..
        }
    )));
}

#[tokio::test]
async fn test_join_while_joining_is_rejected() {
    let gate = Gate::closed();
    let harness = Harness::with(
        LoopbackHub::new(),
        SimulatedDevices::new(),
        StaticCredentialFetcher::new("token-1").with_gate(gate.clone()),
    );
    let coordinator = &harness.coordinator;

    let joining = spawn_join(coordinator);
    bounded("fetch pending", gate.until_waiting(1)).await;

    let err = coordinator.join(SessionId::from("room-2")).await.unwrap_err();
    assert_eq!(
        err,
        JoinError::AlreadyActive {
            state: ConnectionState::FetchingCredential
        }
    );

    gate.open();
    bounded("first join", joining).await.unwrap().unwrap();
    assert_eq!(harness.credentials.calls(), 1);
    assert_eq!(coordinator.join_attempts(), 1);
    coordinator.leave().await;
}

#[tokio::test]
async fn test_concurrent_leaves_tear_down_once() {
    let harness = Harness::new();
    let coordinator = &harness.coordinator;
    let mut events = coordinator.events();
    coordinator.join(SessionId::from("room-1")).await.unwrap();

    bounded(
        "all leaves",
        futures::future::join_all((0..4).map(|_| coordinator.leave())),
    )
    .await;

    assert_eq!(coordinator.state(), ConnectionState::Idle);
    assert_eq!(coordinator.media_stats().release_calls, 1);
    assert_eq!(harness.devices.stop_count(), 2);
    assert_eq!(harness.hub.stats().leave_calls, 1);

    let ended = drain_events(&mut events)
        .await
        .into_iter()
        .filter(|e| matches!(e, LiveSessionEvent::SessionEnded { .. }))
        .count();
    assert_eq!(ended, 1);
}

#[tokio::test]
async fn test_dropping_mount_guard_leaves_joined_session() {
    let harness = Harness::new();
    let coordinator = &harness.coordinator;
    let mut events = coordinator.events();

    let guard = coordinator.mount();
    coordinator.join(SessionId::from("room-1")).await.unwrap();
    drop(guard);

    wait_for_state(coordinator, ConnectionState::Idle).await;
    let ended = next_event(&mut events, |e| matches!(e, LiveSessionEvent::SessionEnded { .. })).await;
    if let LiveSessionEvent::SessionEnded { reason, .. } = ended {
        assert_eq!(reason, EndReason::Unmounted);
    }
    assert_eq!(harness.devices.live_count(), 0);
    assert!(!harness.hub.is_connected());
}

#[tokio::test]
async fn test_dropping_mount_guard_mid_join_aborts_it() {
    let gate = Gate::closed();
    let harness = Harness::with(
        LoopbackHub::new().with_connect_gate(gate.clone()),
        SimulatedDevices::new(),
        StaticCredentialFetcher::new("token-1"),
    );
    let coordinator = &harness.coordinator;

    let guard = coordinator.mount();
    let joining = spawn_join(coordinator);
    bounded("connect pending", gate.until_waiting(1)).await;

    drop(guard);
    eventually("teardown requested", || coordinator.is_tearing_down()).await;

    gate.open();
    let result = bounded("join settles", joining).await.unwrap();
    assert_eq!(result.unwrap_err(), JoinError::Aborted);
    wait_for_state(coordinator, ConnectionState::Idle).await;
    assert_eq!(harness.devices.live_count(), 0);
    assert!(!harness.hub.is_connected());
}

#[tokio::test]
async fn test_unmount_waits_for_teardown() {
    let harness = Harness::new();
    let coordinator = &harness.coordinator;

    let guard = coordinator.mount();
    coordinator.join(SessionId::from("room-1")).await.unwrap();
    assert!(guard.coordinator().is_some());

    guard.unmount().await;
    assert_eq!(coordinator.state(), ConnectionState::Idle);
    assert_eq!(harness.hub.stats().disconnects, 1);
}

#[tokio::test]
async fn test_dropped_join_future_still_completes() {
    let gate = Gate::closed();
    let harness = Harness::with(
        LoopbackHub::new().with_connect_gate(gate.clone()),
        SimulatedDevices::new(),
        StaticCredentialFetcher::new("token-1"),
    );
    let coordinator = &harness.coordinator;

    let abandoned = tokio::time::timeout(
        std::time::Duration::from_millis(10),
        coordinator.join(SessionId::from("room-1")),
    )
    .await;
    assert!(abandoned.is_err());

    bounded("connect pending", gate.until_waiting(1)).await;
    gate.open();
    wait_for_state(coordinator, ConnectionState::Joined).await;
    assert!(harness.hub.is_connected());

    // The join still owns its resources and leave() releases them
    coordinator.leave().await;
    assert_eq!(harness.devices.live_count(), 0);
    assert!(!harness.hub.is_connected());
}

#[tokio::test]
async fn test_leave_returns_when_a_new_join_starts_right_after_teardown() {
    let gate = Gate::closed();
    let harness = Harness::with(
        LoopbackHub::new(),
        SimulatedDevices::new(),
        StaticCredentialFetcher::new("token-1").with_gate(gate.clone()),
    );
    let coordinator = &harness.coordinator;

    let joining = spawn_join(coordinator);
    bounded("fetch pending", gate.until_waiting(1)).await;

    let mut leaving = Box::pin(coordinator.leave());
    assert!(futures::poll!(leaving.as_mut()).is_pending());
    assert!(coordinator.is_tearing_down());

    // The second join runs before the pending leave is polled again, so the
    // coordinator is no longer Idle by the time it looks
    gate.open();
    let result = bounded("first join settles", joining).await.unwrap();
    assert_eq!(result.unwrap_err(), JoinError::Aborted);
    coordinator.join(SessionId::from("room-2")).await.unwrap();
    assert_eq!(coordinator.state(), ConnectionState::Joined);

    bounded("earlier leave returns", leaving).await;
    assert_eq!(coordinator.state(), ConnectionState::Joined);
    assert_eq!(harness.credentials.calls(), 2);

    coordinator.leave().await;
    assert_eq!(coordinator.state(), ConnectionState::Idle);
}
