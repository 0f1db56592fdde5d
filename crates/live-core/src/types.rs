//! Core identifiers and value types shared across the live-session crate
//!
//! Everything in here is plain data: identifiers for sessions, participants and
//! tracks, the media kinds a participant can publish, the join credential and the
//! connection states reported by the hub.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one live call
///
/// Session ids are opaque to the coordinator. They are derived externally from a
/// class or schedule identifier, see [`SessionId::for_class`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Create a session id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the session id used for a scheduled class
    ///
    /// ```rust
    /// use classlive_core::SessionId;
    ///
    /// assert_eq!(SessionId::for_class(42).as_str(), "class_42");
    /// ```
    pub fn for_class(schedule_id: impl fmt::Display) -> Self {
        Self(format!("class_{}", schedule_id))
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identity of a participant, local or remote
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    /// Create a participant id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of a single media track
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub String);

impl TrackId {
    /// Generate a fresh, random track id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kind of media a track carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Microphone audio
    Audio,
    /// Camera video
    Video,
}

impl MediaKind {
    /// Both kinds, audio first
    pub const ALL: [MediaKind; 2] = [MediaKind::Audio, MediaKind::Video];
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => f.write_str("audio"),
            MediaKind::Video => f.write_str("video"),
        }
    }
}

/// One live call as seen by the local participant
///
/// Created when the UI requests a join and dropped once teardown completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The call being joined
    pub session_id: SessionId,
    /// The joining (local) participant
    pub participant_id: ParticipantId,
    /// When the join was requested
    pub requested_at: DateTime<Utc>,
}

impl Session {
    /// Create a session record for a join request made now
    pub fn new(session_id: SessionId, participant_id: ParticipantId) -> Self {
        Self {
            session_id,
            participant_id,
            requested_at: Utc::now(),
        }
    }
}

/// Short-lived token authorizing a participant to connect to one session
///
/// The token is consumed by value when connecting, so a credential can only ever
/// be used once. `Debug` never prints the token itself.
#[derive(Clone, PartialEq, Eq)]
pub struct JoinCredential {
    token: String,
    expires_hint: Option<DateTime<Utc>>,
}

impl JoinCredential {
    /// Create a credential without an expiry hint
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_hint: None,
        }
    }

    /// Attach an absolute expiry hint
    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_hint = Some(expires_at);
        self
    }

    /// Attach an expiry hint relative to now
    pub fn expiring_in(self, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        self.with_expiry(Utc::now() + ttl)
    }

    /// The raw token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// When the issuer expects the token to stop working, if it said so
    pub fn expires_hint(&self) -> Option<DateTime<Utc>> {
        self.expires_hint
    }

    /// Whether the expiry hint is already in the past
    pub fn is_expired(&self) -> bool {
        self.expires_hint.map(|at| at <= Utc::now()).unwrap_or(false)
    }
}

impl fmt::Debug for JoinCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JoinCredential")
            .field("token", &format_args!("<{} bytes>", self.token.len()))
            .field("expires_hint", &self.expires_hint)
            .finish()
    }
}

/// Handle to the local participant's presence in a connected session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParticipantHandle {
    /// Who we are connected as
    pub participant_id: ParticipantId,
    /// Hub-assigned id of this connection
    pub connection_id: String,
    /// When the hub accepted the connection
    pub connected_at: DateTime<Utc>,
}

impl ParticipantHandle {
    /// Create a handle for a connection accepted now
    pub fn new(participant_id: ParticipantId, connection_id: impl Into<String>) -> Self {
        Self {
            participant_id,
            connection_id: connection_id.into(),
            connected_at: Utc::now(),
        }
    }
}

/// Connection state as reported by the hub adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HubConnectionState {
    /// Not connected
    Disconnected,
    /// Connecting for the first time
    Connecting,
    /// Connected and exchanging media
    Connected,
    /// Connection lost, the hub is trying to restore it
    Reconnecting,
    /// Leaving the session
    Disconnecting,
}

impl fmt::Display for HubConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HubConnectionState::Disconnected => "disconnected",
            HubConnectionState::Connecting => "connecting",
            HubConnectionState::Connected => "connected",
            HubConnectionState::Reconnecting => "reconnecting",
            HubConnectionState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_session_ids() {
        assert_eq!(SessionId::for_class(42), SessionId::from("class_42"));
        assert_eq!(SessionId::for_class("7b").to_string(), "class_7b");
    }

    #[test]
    fn test_credential_debug_hides_token() {
        let credential = JoinCredential::new("very-secret-token");
        let printed = format!("{:?}", credential);
        assert!(!printed.contains("very-secret-token"));
        assert!(printed.contains("17 bytes"));
    }

    #[test]
    fn test_credential_expiry_hint() {
        let fresh = JoinCredential::new("t").expiring_in(Duration::from_secs(60));
        assert!(!fresh.is_expired());

        let stale = JoinCredential::new("t").with_expiry(Utc::now() - chrono::Duration::seconds(5));
        assert!(stale.is_expired());

        assert!(!JoinCredential::new("t").is_expired());
    }

    #[test]
    fn test_media_kind_display() {
        assert_eq!(MediaKind::Audio.to_string(), "audio");
        assert_eq!(MediaKind::Video.to_string(), "video");
    }
}
