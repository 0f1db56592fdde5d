//! Shared fixtures for the coordinator integration tests

#![allow(dead_code)]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};

use classlive_core::sim::{LoopbackHub, SimulatedDevices, StaticCredentialFetcher};
use classlive_core::{
    ConnectionState, CoordinatorBuilder, EventIterator, LiveSessionConfig, LiveSessionEvent,
    SessionCoordinator, SubscribeRetryConfig,
};

pub const WAIT: Duration = Duration::from_secs(2);

/// A coordinator wired to simulated collaborators the test can script
pub struct Harness {
    pub coordinator: SessionCoordinator,
    pub hub: Arc<LoopbackHub>,
    pub devices: Arc<SimulatedDevices>,
    pub credentials: Arc<StaticCredentialFetcher>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(
            LoopbackHub::new(),
            SimulatedDevices::new(),
            StaticCredentialFetcher::new("token-1"),
        )
    }

    pub fn with(
        hub: LoopbackHub,
        devices: SimulatedDevices,
        credentials: StaticCredentialFetcher,
    ) -> Self {
        Self::with_config(hub, devices, credentials, test_config())
    }

    pub fn with_config(
        hub: LoopbackHub,
        devices: SimulatedDevices,
        credentials: StaticCredentialFetcher,
        config: LiveSessionConfig,
    ) -> Self {
        let hub = Arc::new(hub);
        let devices = Arc::new(devices);
        let credentials = Arc::new(credentials);

        let coordinator = CoordinatorBuilder::new()
            .participant("instructor-1")
            .config(config)
            .credential_fetcher(credentials.clone())
            .session_client(hub.clone())
            .media_backend(devices.clone())
            .build()
            .expect("harness coordinator");

        Self {
            coordinator,
            hub,
            devices,
            credentials,
        }
    }
}

/// Fast retries and a short drain bound so failures surface quickly
pub fn test_config() -> LiveSessionConfig {
    let mut config = LiveSessionConfig::new("classlive-test").with_subscribe_retry(
        SubscribeRetryConfig {
            max_attempts: 3,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            backoff_multiplier: 2.0,
            use_jitter: false,
        },
    );
    config.event_drain_timeout_ms = 500;
    config
}

/// Poll `condition` until it holds or the wait bound expires
pub async fn eventually(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        sleep(Duration::from_millis(2)).await;
    }
}

/// Wait for the coordinator to reach `state`
pub async fn wait_for_state(coordinator: &SessionCoordinator, state: ConnectionState) {
    let mut changes = coordinator.state_changes();
    timeout(WAIT, changes.wait_for(|current| *current == state))
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for state {}", state))
        .expect("state channel closed");
}

/// Next event matching `predicate`
pub async fn next_event(
    events: &mut EventIterator,
    predicate: impl Fn(&LiveSessionEvent) -> bool,
) -> LiveSessionEvent {
    timeout(WAIT, async {
        loop {
            match events.next().await {
                Some(event) if predicate(&event) => return event,
                Some(_) => continue,
                None => panic!("event stream closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

/// Every event currently buffered, without waiting for more
pub async fn drain_events(events: &mut EventIterator) -> Vec<LiveSessionEvent> {
    let mut drained = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_millis(20), events.next()).await {
        drained.push(event);
    }
    drained
}

/// Run `future` with the standard wait bound
pub async fn bounded<F: Future>(what: &str, future: F) -> F::Output {
    timeout(WAIT, future)
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
}
