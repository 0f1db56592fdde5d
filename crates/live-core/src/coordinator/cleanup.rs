//! Cleanup guard and the teardown protocol
//!
//! Every exit path of a session, successful or not, ends in
//! [`SessionCoordinator::teardown`]. Whoever flips `tearing_down` first owns
//! the resources and runs it; everyone else waits for `Idle`.

use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::coordinator::SessionCoordinator;
use super::state::ConnectionState;
use crate::error::JoinError;
use crate::events::{EndReason, LiveSessionEvent};
use crate::types::{ParticipantHandle, Session, SessionId};

/// The join attempt currently in flight
#[derive(Debug, Clone)]
pub struct JoinTicket {
    /// Sequence number of the attempt
    pub attempt: u64,
    /// Session being joined
    pub session_id: SessionId,
    /// When the attempt started
    pub started_at: Instant,
}

/// Tracks whether teardown was requested and for which join attempt
#[derive(Debug, Default)]
pub struct CleanupGuard {
    tearing_down: bool,
    in_flight: Option<JoinTicket>,
    end_reason: Option<EndReason>,
}

impl CleanupGuard {
    /// Whether late async results must be discarded
    pub fn is_tearing_down(&self) -> bool {
        self.tearing_down
    }

    /// The join attempt still running, if any
    pub fn in_flight(&self) -> Option<&JoinTicket> {
        self.in_flight.as_ref()
    }

    /// Why teardown was requested
    pub fn end_reason(&self) -> Option<&EndReason> {
        self.end_reason.as_ref()
    }

    pub(super) fn begin_join(&mut self, ticket: JoinTicket) {
        self.in_flight = Some(ticket);
    }

    pub(super) fn finish_join(&mut self) {
        self.in_flight = None;
    }

    /// Set the flag; returns `false` if it was already set. The first reason wins.
    pub(super) fn request_teardown(&mut self, reason: EndReason) -> bool {
        if self.tearing_down {
            return false;
        }
        self.tearing_down = true;
        self.end_reason = Some(reason);
        true
    }

    pub(super) fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Everything a session attempt may hold that teardown has to give back
pub(crate) struct SessionResources {
    pub(crate) session: Session,
    pub(crate) handle: Option<ParticipantHandle>,
    /// `acquire()` was started, so `release()` is owed
    pub(crate) media_attempted: bool,
    /// `connect()` was started, so `leave()` is owed once it settled
    pub(crate) connect_attempted: bool,
    pub(crate) event_loop: Option<JoinHandle<()>>,
}

impl SessionResources {
    pub(crate) fn new(session: Session) -> Self {
        Self {
            session,
            handle: None,
            media_attempted: false,
            connect_attempted: false,
            event_loop: None,
        }
    }
}

impl SessionCoordinator {
    /// Run the teardown protocol for resources this caller owns
    ///
    /// The state must already be `LeavingOrError`. Order: leave the hub (which
    /// unregisters event handlers), drain the event loop, release local media,
    /// clear the registry, return to `Idle`.
    pub(crate) async fn teardown(&self, mut resources: SessionResources, reason: EndReason) {
        let session_id = resources.session.session_id.clone();
        info!(session_id = %session_id, reason = %reason, "Tearing down session");

        if resources.connect_attempted {
            if let Some(handle) = &resources.handle {
                debug!(session_id = %session_id, connection_id = %handle.connection_id, "Leaving hub");
            }
            self.inner.client.leave().await;
        }

        if let Some(mut event_loop) = resources.event_loop.take() {
            let drain = self.inner.config.event_drain_timeout();
            match tokio::time::timeout(drain, &mut event_loop).await {
                Ok(_) => debug!(session_id = %session_id, "Hub event loop drained"),
                Err(_) => {
                    warn!(
                        session_id = %session_id,
                        timeout_ms = drain.as_millis() as u64,
                        "Hub event loop did not drain in time, aborting it"
                    );
                    event_loop.abort();
                }
            }
        }

        if resources.media_attempted {
            self.inner.media.release();
        }

        let dropped = self.inner.registry.clear();
        if dropped > 0 {
            debug!(session_id = %session_id, count = dropped, "Cleared remote participants");
        }

        {
            let mut lifecycle = self.inner.lifecycle.lock();
            self.inner.settle(&mut lifecycle);
        }

        info!(session_id = %session_id, reason = %reason, "Session ended");
        self.inner
            .events
            .emit(LiveSessionEvent::SessionEnded { session_id, reason });
    }

    /// Enter `LeavingOrError` from a joining state, returning the reason to report
    fn enter_teardown(&self, fallback: EndReason) -> EndReason {
        let mut lifecycle = self.inner.lifecycle.lock();
        lifecycle.guard.request_teardown(fallback.clone());
        lifecycle.guard.finish_join();
        self.inner
            .transition(&mut lifecycle, ConnectionState::LeavingOrError);
        lifecycle.guard.end_reason().cloned().unwrap_or(fallback)
    }

    /// `leave()` overtook the join: release what it produced and give up
    pub(crate) async fn abort_join(&self, resources: SessionResources) -> JoinError {
        debug!(
            session_id = %resources.session.session_id,
            "Join abandoned after leave was requested, releasing its resources"
        );
        let reason = self.enter_teardown(EndReason::JoinAborted);
        self.teardown(resources, reason).await;
        JoinError::Aborted
    }

    /// A terminal error ended the join after resources were acquired
    pub(crate) async fn fail_join(&self, resources: SessionResources, error: JoinError) -> JoinError {
        if self.inner.is_tearing_down() {
            // leave() was requested while the failing call was pending
            return self.abort_join(resources).await;
        }

        warn!(
            session_id = %resources.session.session_id,
            error = %error,
            "Join failed"
        );
        self.inner.events.emit(LiveSessionEvent::JoinFailed {
            session_id: resources.session.session_id.clone(),
            cause: error.to_string(),
        });

        let reason = self.enter_teardown(EndReason::JoinFailed);
        self.teardown(resources, reason).await;
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_teardown_request_wins() {
        let mut guard = CleanupGuard::default();
        assert!(!guard.is_tearing_down());

        assert!(guard.request_teardown(EndReason::Unmounted));
        assert!(!guard.request_teardown(EndReason::UserLeft));
        assert_eq!(guard.end_reason(), Some(&EndReason::Unmounted));

        guard.reset();
        assert!(!guard.is_tearing_down());
        assert!(guard.end_reason().is_none());
    }

    #[test]
    fn test_ticket_tracks_in_flight_join() {
        let mut guard = CleanupGuard::default();
        guard.begin_join(JoinTicket {
            attempt: 1,
            session_id: SessionId::for_class(42),
            started_at: Instant::now(),
        });
        assert_eq!(guard.in_flight().map(|t| t.attempt), Some(1));

        guard.finish_join();
        assert!(guard.in_flight().is_none());
    }
}
