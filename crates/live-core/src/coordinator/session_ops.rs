//! Join, leave and local media toggles

use std::time::Instant;

use tokio::sync::watch;

use tracing::{debug, error, info, warn, Instrument};

use super::cleanup::{JoinTicket, SessionResources};
use super::coordinator::SessionCoordinator;
use super::event_handler;
use super::state::ConnectionState;
use crate::error::{CredentialError, JoinError, JoinResult, MediaAcquisitionError};
use crate::events::{EndReason, LiveSessionEvent};
use crate::hub::hub_event_channel;
use crate::media::LocalMediaState;
use crate::types::{MediaKind, ParticipantHandle, Session, SessionId};

/// A successful join
#[derive(Debug, Clone)]
pub struct JoinOutcome {
    /// The joined session
    pub session: Session,
    /// Our presence in it
    pub handle: ParticipantHandle,
    /// Local tracks that were published
    pub local_media: LocalMediaState,
    /// Why no local media was published, if that happened
    pub media_error: Option<MediaAcquisitionError>,
}

impl JoinOutcome {
    /// Joined without any local track
    pub fn is_listener_only(&self) -> bool {
        self.local_media.is_empty()
    }
}

enum LeaveStep {
    Nothing,
    /// Another caller owns teardown; wait until the attempt seen here settles
    AwaitSettled(watch::Receiver<u64>),
    Teardown(SessionResources),
}

impl SessionCoordinator {
    /// Join `session_id`
    ///
    /// Fetches a credential, then opens local devices while connecting to the
    /// hub, then publishes whatever local tracks exist. Device failures only
    /// downgrade the join to listener-only. Credential and connect failures are
    /// returned after every acquired resource was released.
    ///
    /// The join runs on its own task: dropping the returned future does not
    /// interrupt it. Use [`leave`](Self::leave) to abandon a pending join.
    pub async fn join(&self, session_id: SessionId) -> JoinResult<JoinOutcome> {
        let span = tracing::info_span!(
            "join",
            session_id = %session_id,
            participant_id = %self.inner.participant_id
        );
        let coordinator = self.clone();
        let task = tokio::spawn(async move { coordinator.run_join(session_id).await }.instrument(span));

        match task.await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Join task did not complete");
                Err(JoinError::Aborted)
            }
        }
    }

    async fn run_join(&self, session_id: SessionId) -> JoinResult<JoinOutcome> {
        let inner = &self.inner;
        let session = Session::new(session_id.clone(), inner.participant_id.clone());

        {
            let mut lifecycle = inner.lifecycle.lock();
            if lifecycle.state != ConnectionState::Idle {
                return Err(JoinError::AlreadyActive {
                    state: lifecycle.state,
                });
            }
            lifecycle.attempts += 1;
            let attempt = lifecycle.attempts;
            lifecycle.guard.begin_join(JoinTicket {
                attempt,
                session_id: session_id.clone(),
                started_at: Instant::now(),
            });
            lifecycle.session = Some(session.clone());
            inner.transition(&mut lifecycle, ConnectionState::FetchingCredential);
        }
        info!("Joining session");

        let credential = match inner.fetcher.fetch(&session_id, &inner.participant_id).await {
            Ok(credential) => credential,
            Err(error) => return Err(self.credential_failed(&session, error)),
        };

        let mut resources = SessionResources::new(session.clone());
        if !inner.advance(ConnectionState::FetchingCredential, ConnectionState::AcquiringMedia) {
            debug!("Discarding credential fetched after leave was requested");
            drop(credential);
            return Err(self.abort_join(resources).await);
        }

        let (sink, hub_events) = hub_event_channel();
        inner.client.register_events(sink);
        resources.media_attempted = true;
        resources.connect_attempted = true;

        let wants = &inner.config.media;
        let acquire = async {
            let outcome = inner.media.acquire(wants.want_audio, wants.want_video).await;
            inner.advance(ConnectionState::AcquiringMedia, ConnectionState::Connecting);
            outcome
        };
        let connect = inner.client.connect(&inner.config.app_id, &session, credential);
        let (media, connected) = futures::join!(acquire, connect);

        if let Some(error) = &media.error {
            warn!(error = %error, "Local media unavailable, joining as listener only");
            inner.events.emit(LiveSessionEvent::ListenerOnly {
                error: error.clone(),
            });
        }

        let handle = match connected {
            Ok(handle) => handle,
            Err(error) => return Err(self.fail_join(resources, error.into()).await),
        };
        resources.handle = Some(handle.clone());

        if inner.is_tearing_down() {
            debug!("Connect completed after leave was requested, leaving immediately");
            return Err(self.abort_join(resources).await);
        }

        let tracks = media.state.tracks();
        debug!(tracks = tracks.len(), "Publishing local tracks");
        if let Err(error) = inner.client.publish(&tracks).await {
            return Err(self.fail_join(resources, error.into()).await);
        }

        {
            let mut lifecycle = inner.lifecycle.lock();
            if !lifecycle.guard.is_tearing_down()
                && inner.transition(&mut lifecycle, ConnectionState::Joined)
            {
                lifecycle.guard.finish_join();
                resources.event_loop = Some(event_handler::spawn(
                    self.clone(),
                    hub_events,
                    session_id.clone(),
                ));
                lifecycle.active = Some(resources);

                info!(
                    connection_id = %handle.connection_id,
                    listener_only = media.state.is_empty(),
                    "Joined session"
                );
                return Ok(JoinOutcome {
                    session,
                    handle,
                    local_media: media.state,
                    media_error: media.error,
                });
            }
        }

        Err(self.abort_join(resources).await)
    }

    /// Nothing is held yet, so a credential failure goes straight back to `Idle`
    fn credential_failed(&self, session: &Session, error: CredentialError) -> JoinError {
        let reason = {
            let mut lifecycle = self.inner.lifecycle.lock();
            let reason = lifecycle.guard.end_reason().cloned();
            self.inner.settle(&mut lifecycle);
            reason
        };

        let session_id = session.session_id.clone();
        match reason {
            Some(reason) => {
                debug!(error = %error, "Credential fetch failed after leave was requested");
                self.inner
                    .events
                    .emit(LiveSessionEvent::SessionEnded { session_id, reason });
                JoinError::Aborted
            }
            None => {
                warn!(error = %error, "Could not obtain a join credential");
                self.inner.events.emit(LiveSessionEvent::JoinFailed {
                    session_id,
                    cause: error.to_string(),
                });
                error.into()
            }
        }
    }

    /// Leave the current session
    ///
    /// Safe in every state and idempotent. While a join is pending the
    /// in-flight step is allowed to settle and whatever it produced is released.
    /// Returns once the coordinator is back to `Idle`.
    pub async fn leave(&self) {
        self.leave_with(EndReason::UserLeft).await;
    }

    /// Leave, reporting `reason` in the `SessionEnded` event
    pub async fn leave_with(&self, reason: EndReason) {
        let step = {
            let mut lifecycle = self.inner.lifecycle.lock();
            match lifecycle.state {
                ConnectionState::Idle => LeaveStep::Nothing,
                _ if lifecycle.guard.is_tearing_down() => {
                    LeaveStep::AwaitSettled(self.inner.attempts_settled.subscribe())
                }
                ConnectionState::Joined => {
                    lifecycle.guard.request_teardown(reason.clone());
                    match lifecycle.active.take() {
                        Some(resources) => {
                            self.inner
                                .transition(&mut lifecycle, ConnectionState::LeavingOrError);
                            LeaveStep::Teardown(resources)
                        }
                        None => {
                            error!("Joined without session resources, resetting");
                            self.inner
                                .transition(&mut lifecycle, ConnectionState::LeavingOrError);
                            self.inner.settle(&mut lifecycle);
                            LeaveStep::Nothing
                        }
                    }
                }
                state => {
                    lifecycle.guard.request_teardown(reason.clone());
                    info!(
                        state = %state,
                        reason = %reason,
                        "Leave requested while joining, tearing down once the pending step settles"
                    );
                    LeaveStep::AwaitSettled(self.inner.attempts_settled.subscribe())
                }
            }
        };

        match step {
            LeaveStep::Nothing => debug!("Leave requested while idle"),
            LeaveStep::AwaitSettled(settled) => Self::wait_until_settled(settled).await,
            LeaveStep::Teardown(resources) => self.teardown(resources, reason).await,
        }
    }

    /// The receiver was subscribed under the lifecycle lock, so the settle of
    /// the attempt it observed is the next change it can see. A later join
    /// leaving `Idle` again does not hide it.
    async fn wait_until_settled(mut settled: watch::Receiver<u64>) {
        if settled.changed().await.is_err() {
            debug!("Coordinator dropped while waiting for teardown");
        }
    }

    /// Flip the microphone mute state
    ///
    /// Returns the new state, `None` without a microphone track. Never changes
    /// the connection state.
    pub fn toggle_audio(&self) -> Option<bool> {
        self.toggle(MediaKind::Audio)
    }

    /// Flip the camera enabled state
    ///
    /// Returns the new muted state, `None` without a camera track.
    pub fn toggle_video(&self) -> Option<bool> {
        self.toggle(MediaKind::Video)
    }

    /// Mute or unmute the microphone
    pub fn set_audio_muted(&self, muted: bool) -> bool {
        self.set_muted(MediaKind::Audio, muted)
    }

    /// Disable or enable the camera
    pub fn set_video_muted(&self, muted: bool) -> bool {
        self.set_muted(MediaKind::Video, muted)
    }

    fn toggle(&self, kind: MediaKind) -> Option<bool> {
        let muted = self.inner.media.toggle(kind)?;
        self.inner
            .events
            .emit(LiveSessionEvent::LocalMediaToggled { kind, muted });
        Some(muted)
    }

    fn set_muted(&self, kind: MediaKind, muted: bool) -> bool {
        let applied = self.inner.media.set_muted(kind, muted);
        if applied {
            self.inner
                .events
                .emit(LiveSessionEvent::LocalMediaToggled { kind, muted });
        }
        applied
    }
}
