//! Loopback session hub
//!
//! Accepts any join whose credential has not expired and records every call
//! the coordinator makes. Remote participants, dropped connections and
//! interruptions are injected by the caller through the `remote_*` and
//! connection methods, and arrive on the registered event channel exactly as
//! the real hub would deliver them.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use uuid::Uuid;

use super::Gate;
use crate::error::{ConnectError, ConnectErrorKind, SubscribeError, SubscribeFailure};
use crate::hub::{HubEvent, HubEventSink, SessionClient};
use crate::media::LocalTrackRef;
use crate::registry::RemoteTrack;
use crate::types::{
    HubConnectionState, JoinCredential, MediaKind, ParticipantHandle, ParticipantId, Session,
    SessionId, TrackId,
};

/// Call counters of a [`LoopbackHub`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HubStats {
    /// Calls to `connect`
    pub connect_calls: usize,
    /// Successful connects
    pub connects: usize,
    /// Calls to `publish`
    pub publish_calls: usize,
    /// Track count of the last `publish`
    pub last_publish_size: usize,
    /// Calls to `subscribe`
    pub subscribe_calls: usize,
    /// Calls to `leave`
    pub leave_calls: usize,
    /// `leave` calls that actually disconnected
    pub disconnects: usize,
}

struct Connection {
    session_id: SessionId,
    participant_id: ParticipantId,
    app_id: String,
}

#[derive(Default)]
struct HubState {
    sink: Option<HubEventSink>,
    connection: Option<Connection>,
    link: Option<HubConnectionState>,
    /// Remote participants and what they publish, in join order
    remote: Vec<(ParticipantId, Vec<MediaKind>)>,
    published: Vec<LocalTrackRef>,
    connect_failure: Option<ConnectError>,
    publish_failure: Option<ConnectError>,
    subscribe_failures: HashMap<(ParticipantId, MediaKind), VecDeque<SubscribeFailure>>,
    stats: HubStats,
}

impl HubState {
    fn emit(&self, event: HubEvent) {
        if let Some(sink) = &self.sink {
            if !sink.emit(event) {
                debug!("Loopback hub event dropped, receiver gone");
            }
        }
    }

    fn set_link(&mut self, current: HubConnectionState, reason: Option<String>) {
        let previous = self.link.unwrap_or(HubConnectionState::Disconnected);
        self.link = Some(current);
        self.emit(HubEvent::ConnectionStateChanged {
            previous,
            current,
            reason,
        });
    }

    fn publishes(&self, participant_id: &ParticipantId, kind: MediaKind) -> bool {
        self.remote
            .iter()
            .any(|(id, kinds)| id == participant_id && kinds.contains(&kind))
    }
}

/// In-process hub with scripted remote participants
///
/// Implements [`SessionClient`] for the local side; the remaining methods play
/// the remote side and the network.
pub struct LoopbackHub {
    state: Mutex<HubState>,
    connect_gate: Option<Gate>,
}

impl LoopbackHub {
    /// An empty hub
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            connect_gate: None,
        }
    }

    /// Hold each `connect` until `gate` opens
    pub fn with_connect_gate(mut self, gate: Gate) -> Self {
        self.connect_gate = Some(gate);
        self
    }

    /// Make the next `connect` fail
    pub fn fail_next_connect(&self, error: ConnectError) {
        self.state.lock().connect_failure = Some(error);
    }

    /// Make the next `publish` fail
    pub fn fail_next_publish(&self, error: ConnectError) {
        self.state.lock().publish_failure = Some(error);
    }

    /// Fail the next subscriptions to `kind` of `participant_id`, one failure per call
    pub fn fail_subscribe(
        &self,
        participant_id: impl Into<ParticipantId>,
        kind: MediaKind,
        failures: impl IntoIterator<Item = SubscribeFailure>,
    ) {
        self.state
            .lock()
            .subscribe_failures
            .entry((participant_id.into(), kind))
            .or_default()
            .extend(failures);
    }

    /// A remote participant starts publishing `kind`
    pub fn remote_publish(&self, participant_id: impl Into<ParticipantId>, kind: MediaKind) {
        let participant_id = participant_id.into();
        let mut state = self.state.lock();
        match state.remote.iter_mut().find(|(id, _)| *id == participant_id) {
            Some((_, kinds)) if kinds.contains(&kind) => {}
            Some((_, kinds)) => kinds.push(kind),
            None => state.remote.push((participant_id.clone(), vec![kind])),
        }
        if state.connection.is_some() {
            state.emit(HubEvent::RemotePublished {
                participant_id,
                kind,
            });
        }
    }

    /// A remote participant stops publishing `kind`
    pub fn remote_unpublish(&self, participant_id: impl Into<ParticipantId>, kind: MediaKind) {
        let participant_id = participant_id.into();
        let mut state = self.state.lock();
        if let Some((_, kinds)) = state.remote.iter_mut().find(|(id, _)| *id == participant_id) {
            kinds.retain(|k| *k != kind);
        }
        if state.connection.is_some() {
            state.emit(HubEvent::RemoteUnpublished {
                participant_id,
                kind,
            });
        }
    }

    /// A remote participant leaves
    pub fn remote_leave(&self, participant_id: impl Into<ParticipantId>) {
        let participant_id = participant_id.into();
        let mut state = self.state.lock();
        state.remote.retain(|(id, _)| *id != participant_id);
        if state.connection.is_some() {
            state.emit(HubEvent::RemoteLeft { participant_id });
        }
    }

    /// The network drops the connection
    pub fn drop_connection(&self, reason: impl Into<String>) {
        let mut state = self.state.lock();
        if state.connection.take().is_some() {
            state.published.clear();
            state.set_link(HubConnectionState::Disconnected, Some(reason.into()));
        }
    }

    /// The connection is lost and being restored
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        if state.connection.is_some() {
            state.set_link(HubConnectionState::Reconnecting, None);
        }
    }

    /// A lost connection is restored
    pub fn restore(&self) {
        let mut state = self.state.lock();
        if state.connection.is_some() {
            state.set_link(HubConnectionState::Connected, None);
        }
    }

    /// The hub reports a non-fatal exception
    pub fn raise_exception(&self, code: i32, message: Option<&str>) {
        self.state.lock().emit(HubEvent::Exception {
            code,
            message: message.map(str::to_string),
        });
    }

    /// Whether a connection is active
    pub fn is_connected(&self) -> bool {
        self.state.lock().connection.is_some()
    }

    /// Whether event handlers are still registered
    pub fn has_event_handlers(&self) -> bool {
        self.state
            .lock()
            .sink
            .as_ref()
            .map(|sink| !sink.is_closed())
            .unwrap_or(false)
    }

    /// Session of the active connection
    pub fn connected_session(&self) -> Option<SessionId> {
        self.state
            .lock()
            .connection
            .as_ref()
            .map(|c| c.session_id.clone())
    }

    /// Application id of the active connection
    pub fn connected_app_id(&self) -> Option<String> {
        self.state.lock().connection.as_ref().map(|c| c.app_id.clone())
    }

    /// Local tracks currently published
    pub fn published_tracks(&self) -> Vec<LocalTrackRef> {
        self.state.lock().published.clone()
    }

    /// Call counters
    pub fn stats(&self) -> HubStats {
        self.state.lock().stats
    }
}

impl Default for LoopbackHub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionClient for LoopbackHub {
    fn register_events(&self, sink: HubEventSink) {
        self.state.lock().sink = Some(sink);
    }

    async fn connect(
        &self,
        app_id: &str,
        session: &Session,
        credential: JoinCredential,
    ) -> Result<ParticipantHandle, ConnectError> {
        self.state.lock().stats.connect_calls += 1;
        if let Some(gate) = &self.connect_gate {
            gate.pass().await;
        }

        let mut state = self.state.lock();
        if state.connection.is_some() {
            return Err(ConnectError::already_connected());
        }
        if let Some(error) = state.connect_failure.take() {
            return Err(error);
        }
        if credential.token().trim().is_empty() || credential.is_expired() {
            return Err(ConnectError::invalid_credential("token is empty or expired"));
        }

        state.connection = Some(Connection {
            session_id: session.session_id.clone(),
            participant_id: session.participant_id.clone(),
            app_id: app_id.to_string(),
        });
        state.stats.connects += 1;
        state.link = Some(HubConnectionState::Connecting);
        state.set_link(HubConnectionState::Connected, None);

        let already_publishing: Vec<_> = state
            .remote
            .iter()
            .flat_map(|(id, kinds)| kinds.iter().map(move |kind| (id.clone(), *kind)))
            .collect();
        for (participant_id, kind) in already_publishing {
            state.emit(HubEvent::RemotePublished {
                participant_id,
                kind,
            });
        }

        debug!(session_id = %session.session_id, app_id, "Loopback hub connected");
        Ok(ParticipantHandle::new(
            session.participant_id.clone(),
            Uuid::new_v4().to_string(),
        ))
    }

    async fn publish(&self, tracks: &[LocalTrackRef]) -> Result<(), ConnectError> {
        let mut state = self.state.lock();
        state.stats.publish_calls += 1;
        state.stats.last_publish_size = tracks.len();

        if state.connection.is_none() {
            return Err(ConnectError::new(ConnectErrorKind::Unknown, "publish before connect"));
        }
        if let Some(error) = state.publish_failure.take() {
            return Err(error);
        }

        state.published = tracks.to_vec();
        Ok(())
    }

    async fn subscribe(
        &self,
        participant_id: &ParticipantId,
        kind: MediaKind,
    ) -> Result<RemoteTrack, SubscribeError> {
        let mut state = self.state.lock();
        state.stats.subscribe_calls += 1;

        let fail = |failure| SubscribeError::new(participant_id.clone(), kind, failure);
        if state.connection.is_none() {
            return Err(fail(SubscribeFailure::Rejected("not connected".to_string())));
        }
        if let Some(failure) = state
            .subscribe_failures
            .get_mut(&(participant_id.clone(), kind))
            .and_then(VecDeque::pop_front)
        {
            return Err(fail(failure));
        }
        if !state.publishes(participant_id, kind) {
            return Err(fail(SubscribeFailure::NotPublished));
        }

        Ok(RemoteTrack::new(TrackId::generate(), participant_id.clone(), kind))
    }

    async fn leave(&self) {
        let mut state = self.state.lock();
        state.stats.leave_calls += 1;

        if let Some(connection) = state.connection.take() {
            state.stats.disconnects += 1;
            state.published.clear();
            state.link = Some(HubConnectionState::Disconnected);
            debug!(
                session_id = %connection.session_id,
                participant_id = %connection.participant_id,
                "Loopback hub left session"
            );
        }

        // Unregistering handlers is the last step
        state.sink = None;
    }
}
