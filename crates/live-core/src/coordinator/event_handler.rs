//! Hub event loop
//!
//! One task per joined session drains the hub event channel in order. Every
//! event is checked against the teardown flag before it touches the registry,
//! and subscriptions are retried inline so later events for the same
//! participant apply after the retry settles.

use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use super::coordinator::SessionCoordinator;
use crate::error::SubscribeFailure;
use crate::events::{EndReason, LiveSessionEvent};
use crate::hub::{HubEvent, HubEventReceiver};
use crate::recovery::{retry_with_backoff, RetryOutcome};
use crate::types::{HubConnectionState, MediaKind, ParticipantId, SessionId};

pub(super) fn spawn(
    coordinator: SessionCoordinator,
    events: HubEventReceiver,
    session_id: SessionId,
) -> JoinHandle<()> {
    let span = tracing::info_span!("hub_events", session_id = %session_id);
    tokio::spawn(run(coordinator, events).instrument(span))
}

async fn run(coordinator: SessionCoordinator, mut events: HubEventReceiver) {
    let mut interrupted = false;

    while let Some(event) = events.recv().await {
        if coordinator.inner.is_tearing_down() {
            debug!(event = event.name(), "Dropping hub event during teardown");
            continue;
        }

        match event {
            HubEvent::RemotePublished {
                participant_id,
                kind,
            } => coordinator.on_remote_published(participant_id, kind).await,

            HubEvent::RemoteUnpublished {
                participant_id,
                kind,
            } => {
                if coordinator.inner.registry.on_unpublished(&participant_id, kind) {
                    debug!(participant_id = %participant_id, kind = %kind, "Remote track unpublished");
                    coordinator.inner.events.emit(LiveSessionEvent::RemoteMediaChanged {
                        participant_id,
                        kind,
                        available: false,
                    });
                }
            }

            HubEvent::RemoteLeft { participant_id } => {
                if coordinator.inner.registry.on_left(&participant_id) {
                    info!(participant_id = %participant_id, "Remote participant left");
                    coordinator
                        .inner
                        .events
                        .emit(LiveSessionEvent::RemoteParticipantLeft { participant_id });
                }
            }

            HubEvent::ConnectionStateChanged {
                previous,
                current,
                reason,
            } => match current {
                HubConnectionState::Disconnected => {
                    warn!(from = %previous, reason = ?reason, "Hub connection lost");
                    let leaving = coordinator.clone();
                    tokio::spawn(async move {
                        leaving
                            .leave_with(EndReason::Disconnected { detail: reason })
                            .await;
                    });
                    break;
                }
                HubConnectionState::Reconnecting => {
                    warn!(from = %previous, "Hub connection interrupted, reconnecting");
                    interrupted = true;
                    coordinator
                        .inner
                        .events
                        .emit(LiveSessionEvent::ConnectionInterrupted { state: current });
                }
                HubConnectionState::Connected if interrupted => {
                    info!("Hub connection restored");
                    interrupted = false;
                    coordinator.inner.events.emit(LiveSessionEvent::ConnectionRestored);
                }
                other => debug!(from = %previous, to = %other, "Hub connection state changed"),
            },

            HubEvent::Exception { code, message } => {
                warn!(code, message = ?message, "Hub reported an exception");
                coordinator
                    .inner
                    .events
                    .emit(LiveSessionEvent::HubException { code, message });
            }
        }
    }

    debug!("Hub event loop finished");
}

impl SessionCoordinator {
    async fn on_remote_published(&self, participant_id: ParticipantId, kind: MediaKind) {
        let inner = &self.inner;
        let outcome = retry_with_backoff(
            "subscribe",
            &inner.retry,
            || inner.client.subscribe(&participant_id, kind),
            || inner.is_tearing_down(),
        )
        .await;

        match outcome {
            RetryOutcome::Succeeded { value: track, attempts } => {
                if inner.is_tearing_down() {
                    debug!(participant_id = %participant_id, kind = %kind, "Dropping track subscribed during teardown");
                    return;
                }
                if inner.registry.on_published(&participant_id, kind, track) {
                    debug!(participant_id = %participant_id, kind = %kind, attempts, "Subscribed to remote track");
                    inner.events.emit(LiveSessionEvent::RemoteMediaChanged {
                        participant_id,
                        kind,
                        available: true,
                    });
                }
            }
            RetryOutcome::Failed { error, attempts } => {
                if inner.is_tearing_down() {
                    debug!(participant_id = %participant_id, kind = %kind, "Subscribe failed during teardown");
                    return;
                }
                if error.failure == SubscribeFailure::NotPublished {
                    info!(participant_id = %participant_id, kind = %kind, "Remote track was unpublished before it could be subscribed");
                    return;
                }

                warn!(
                    participant_id = %participant_id,
                    kind = %kind,
                    attempts,
                    error = %error,
                    "Giving up on remote track"
                );
                inner.registry.mark_degraded(&participant_id, kind);
                inner.events.emit(LiveSessionEvent::SubscribeFailed {
                    participant_id,
                    kind,
                    cause: error.to_string(),
                });
            }
            RetryOutcome::Stopped { attempts } => {
                debug!(participant_id = %participant_id, kind = %kind, attempts, "Subscribe abandoned for teardown");
            }
        }
    }
}
