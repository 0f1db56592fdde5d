//! Core SessionCoordinator structure and read access

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{error, info};

use super::cleanup::{CleanupGuard, JoinTicket, SessionResources};
use super::mount::MountGuard;
use super::state::ConnectionState;
use crate::config::LiveSessionConfig;
use crate::credential::CredentialFetcher;
use crate::events::{EventEmitter, EventIterator, EventStream, LiveSessionEvent};
use crate::hub::SessionClient;
use crate::media::{LocalMediaManager, LocalMediaState, MediaStats};
use crate::recovery::RetryConfig;
use crate::registry::{RemoteParticipant, RemoteParticipantRegistry};
use crate::types::{ParticipantId, Session};

/// Mutable lifecycle data, only touched under the lifecycle lock
pub(super) struct Lifecycle {
    pub(super) state: ConnectionState,
    pub(super) guard: CleanupGuard,
    /// Resources of the joined session, present exactly while `Joined`
    pub(super) active: Option<SessionResources>,
    /// Session of the current attempt, from join request until teardown completes
    pub(super) session: Option<Session>,
    pub(super) attempts: u64,
}

pub(super) struct CoordinatorInner {
    pub(super) participant_id: ParticipantId,
    pub(super) config: LiveSessionConfig,
    pub(super) retry: RetryConfig,
    pub(super) fetcher: Arc<dyn CredentialFetcher>,
    pub(super) client: Arc<dyn SessionClient>,
    pub(super) media: LocalMediaManager,
    pub(super) registry: RemoteParticipantRegistry,
    pub(super) events: EventEmitter,
    pub(super) lifecycle: Mutex<Lifecycle>,
    pub(super) state_tx: watch::Sender<ConnectionState>,
    /// Bumped under the lifecycle lock each time an attempt returns to `Idle`
    pub(super) attempts_settled: watch::Sender<u64>,
}

impl CoordinatorInner {
    /// Move to `next`, publishing the change; illegal transitions are refused
    pub(super) fn transition(&self, lifecycle: &mut Lifecycle, next: ConnectionState) -> bool {
        let previous = lifecycle.state;
        if !previous.can_transition_to(next) {
            error!(from = %previous, to = %next, "Refusing invalid state transition");
            return false;
        }

        lifecycle.state = next;
        self.state_tx.send_replace(next);
        info!(
            participant_id = %self.participant_id,
            from = %previous,
            to = %next,
            "Connection state changed"
        );
        self.events.emit(LiveSessionEvent::StateChanged {
            previous,
            current: next,
        });
        true
    }

    /// Move from `from` to `to` unless teardown was requested meanwhile
    pub(super) fn advance(&self, from: ConnectionState, to: ConnectionState) -> bool {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.guard.is_tearing_down() || lifecycle.state != from {
            return false;
        }
        self.transition(&mut lifecycle, to)
    }

    pub(super) fn is_tearing_down(&self) -> bool {
        self.lifecycle.lock().guard.is_tearing_down()
    }

    /// Return to `Idle` and wake everyone waiting for the current attempt to end
    pub(super) fn settle(&self, lifecycle: &mut Lifecycle) {
        lifecycle.guard.reset();
        lifecycle.session = None;
        lifecycle.active = None;
        self.transition(lifecycle, ConnectionState::Idle);
        self.attempts_settled.send_modify(|settled| *settled += 1);
    }
}

/// Orchestrates one participant's live sessions
///
/// Cloning is cheap and every clone drives the same state machine. Build one
/// with [`CoordinatorBuilder`](super::CoordinatorBuilder).
#[derive(Clone)]
pub struct SessionCoordinator {
    pub(super) inner: Arc<CoordinatorInner>,
}

impl SessionCoordinator {
    pub(super) fn from_parts(
        participant_id: ParticipantId,
        config: LiveSessionConfig,
        fetcher: Arc<dyn CredentialFetcher>,
        client: Arc<dyn SessionClient>,
        media: LocalMediaManager,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        let (attempts_settled, _) = watch::channel(0);
        let events = EventEmitter::new(config.event_capacity);
        let retry = config.subscribe_retry.to_retry_config();

        Self {
            inner: Arc::new(CoordinatorInner {
                participant_id,
                config,
                retry,
                fetcher,
                client,
                media,
                registry: RemoteParticipantRegistry::new(),
                events,
                lifecycle: Mutex::new(Lifecycle {
                    state: ConnectionState::Idle,
                    guard: CleanupGuard::default(),
                    active: None,
                    session: None,
                    attempts: 0,
                }),
                state_tx,
                attempts_settled,
            }),
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.inner.lifecycle.lock().state
    }

    /// Whether the call is joined
    pub fn is_joined(&self) -> bool {
        self.state().is_joined()
    }

    /// Watch the connection state
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Subscribe to UI events
    pub fn subscribe_events(&self) -> EventStream {
        self.inner.events.subscribe()
    }

    /// Subscribe to UI events without needing `StreamExt`
    pub fn events(&self) -> EventIterator {
        self.inner.events.subscribe_simple()
    }

    /// Remote participants in display order
    pub fn remote_participants(&self) -> Vec<RemoteParticipant> {
        self.inner.registry.snapshot()
    }

    /// The remote participant registry
    pub fn registry(&self) -> &RemoteParticipantRegistry {
        &self.inner.registry
    }

    /// Local tracks and mute flags
    pub fn local_media(&self) -> LocalMediaState {
        self.inner.media.state()
    }

    /// Local media counters
    pub fn media_stats(&self) -> MediaStats {
        self.inner.media.stats()
    }

    /// The session being joined or joined, if any
    pub fn current_session(&self) -> Option<Session> {
        self.inner.lifecycle.lock().session.clone()
    }

    /// The join attempt still in flight, if any
    pub fn pending_join(&self) -> Option<JoinTicket> {
        self.inner.lifecycle.lock().guard.in_flight().cloned()
    }

    /// Whether teardown was requested and has not finished yet
    pub fn is_tearing_down(&self) -> bool {
        self.inner.is_tearing_down()
    }

    /// Number of join attempts made so far
    pub fn join_attempts(&self) -> u64 {
        self.inner.lifecycle.lock().attempts
    }

    /// Local participant
    pub fn participant_id(&self) -> &ParticipantId {
        &self.inner.participant_id
    }

    /// Active configuration
    pub fn config(&self) -> &LiveSessionConfig {
        &self.inner.config
    }

    /// Tie the session to the lifetime of a view
    ///
    /// Dropping the returned guard leaves the session.
    pub fn mount(&self) -> MountGuard {
        MountGuard::new(self.clone())
    }
}

impl std::fmt::Debug for SessionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let lifecycle = self.inner.lifecycle.lock();
        f.debug_struct("SessionCoordinator")
            .field("participant_id", &self.inner.participant_id)
            .field("state", &lifecycle.state)
            .field("tearing_down", &lifecycle.guard.is_tearing_down())
            .field("session", &lifecycle.session.as_ref().map(|s| &s.session_id))
            .finish()
    }
}
