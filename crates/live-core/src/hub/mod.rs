//! Session hub adapter contract
//!
//! The hub is the external real-time transport. This crate never talks to it
//! directly; it goes through a [`SessionClient`] implementation wrapping the
//! vendor SDK. [`LoopbackHub`](crate::sim::LoopbackHub) is an in-process one.
//!
//! # Contract
//!
//! - `connect` fails with `AlreadyConnected` when a connection is active.
//! - `publish` with an empty slice is a legal no-op.
//! - `leave` is idempotent and a no-op when not connected. Its last step drops
//!   the registered [`HubEventSink`], so no event is delivered after it returns.

mod events;

pub use events::{hub_event_channel, HubEvent, HubEventReceiver, HubEventSink};

use async_trait::async_trait;

use crate::error::{ConnectError, SubscribeError};
use crate::media::LocalTrackRef;
use crate::registry::RemoteTrack;
use crate::types::{JoinCredential, MediaKind, ParticipantHandle, ParticipantId, Session};

/// Adapter over an external session hub
#[async_trait]
pub trait SessionClient: Send + Sync {
    /// Route hub callbacks into `sink` until the next `leave`
    fn register_events(&self, sink: HubEventSink);

    /// Connect to `session` as its participant, consuming the credential
    async fn connect(
        &self,
        app_id: &str,
        session: &Session,
        credential: JoinCredential,
    ) -> Result<ParticipantHandle, ConnectError>;

    /// Start transmitting the given local tracks
    async fn publish(&self, tracks: &[LocalTrackRef]) -> Result<(), ConnectError>;

    /// Subscribe to `kind` of a remote participant
    async fn subscribe(
        &self,
        participant_id: &ParticipantId,
        kind: MediaKind,
    ) -> Result<RemoteTrack, SubscribeError>;

    /// Leave the session and unregister event handlers
    async fn leave(&self);
}
