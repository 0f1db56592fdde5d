//! Error types for the live-session coordinator
//!
//! Terminal errors ([`CredentialError`], [`ConnectError`]) end a join attempt and
//! reach the caller through [`JoinError`]. The others are advisory: a
//! [`MediaAcquisitionError`] downgrades the join to listener-only and a
//! [`SubscribeError`] only affects one remote track.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::coordinator::ConnectionState;
use crate::types::{MediaKind, ParticipantId};

/// Result type for credential fetches
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Result type for `join()`
pub type JoinResult<T> = Result<T, JoinError>;

/// Failure to obtain a usable join credential
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// The credential service could not be reached
    #[error("Credential service unreachable: {message}")]
    Network { message: String },

    /// The caller's bearer credential was refused
    #[error("Not authorized to join this session (HTTP {status})")]
    Unauthorized { status: u16 },

    /// The service answered with an error status
    #[error("Credential service rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response did not contain a usable token
    #[error("Credential service returned no usable token: {reason}")]
    Malformed { reason: String },

    /// The fetcher itself is misconfigured
    #[error("Credential fetcher misconfigured: {message}")]
    Configuration { message: String },
}

impl CredentialError {
    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a malformed-response error
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Why a local capture device could not be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaErrorKind {
    /// The user or platform refused device access
    PermissionDenied,
    /// No such device exists
    NotFound,
    /// The device is held by another application
    InUse,
    /// Anything else
    Unknown,
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaErrorKind::PermissionDenied => "permission-denied",
            MediaErrorKind::NotFound => "not-found",
            MediaErrorKind::InUse => "in-use",
            MediaErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Local device acquisition failed; the join continues as listener-only
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not open {} ({kind}): {message}", media_label(.media))]
pub struct MediaAcquisitionError {
    /// Failure classification
    pub kind: MediaErrorKind,
    /// Which device failed, when known
    pub media: Option<MediaKind>,
    /// Details from the device backend
    pub message: String,
}

impl MediaAcquisitionError {
    /// Create an acquisition error for one device kind
    pub fn new(kind: MediaErrorKind, media: MediaKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            media: Some(media),
            message: message.into(),
        }
    }

    /// Create a permission-denied error
    pub fn permission_denied(media: MediaKind) -> Self {
        Self::new(MediaErrorKind::PermissionDenied, media, "device access was denied")
    }

    /// Create a not-found error
    pub fn not_found(media: MediaKind) -> Self {
        Self::new(MediaErrorKind::NotFound, media, "no capture device available")
    }

    /// Create an in-use error
    pub fn in_use(media: MediaKind) -> Self {
        Self::new(MediaErrorKind::InUse, media, "device is in use by another application")
    }
}

fn media_label(media: &Option<MediaKind>) -> String {
    media
        .map(|kind| kind.to_string())
        .unwrap_or_else(|| "local media".to_string())
}

/// Why connecting to the hub failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectErrorKind {
    /// The hub refused the join credential
    InvalidCredential,
    /// The hub could not be reached
    Network,
    /// The client is already connected to a session
    AlreadyConnected,
    /// Anything else
    Unknown,
}

impl fmt::Display for ConnectErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectErrorKind::InvalidCredential => "invalid-credential",
            ConnectErrorKind::Network => "network",
            ConnectErrorKind::AlreadyConnected => "already-connected",
            ConnectErrorKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Connecting to (or publishing into) the hub failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not connect to the session ({kind}): {message}")]
pub struct ConnectError {
    /// Failure classification
    pub kind: ConnectErrorKind,
    /// Details from the hub adapter
    pub message: String,
}

impl ConnectError {
    /// Create a connect error
    pub fn new(kind: ConnectErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create an invalid-credential error
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::new(ConnectErrorKind::InvalidCredential, message)
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ConnectErrorKind::Network, message)
    }

    /// Create an already-connected error
    pub fn already_connected() -> Self {
        Self::new(ConnectErrorKind::AlreadyConnected, "client is already connected")
    }
}

/// Why a remote track subscription failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscribeFailure {
    /// The remote participant does not publish that kind (any more)
    NotPublished,
    /// Transport-level failure, worth retrying
    Transport(String),
    /// The hub timed out, worth retrying
    Timeout,
    /// The hub refused the subscription
    Rejected(String),
}

impl fmt::Display for SubscribeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscribeFailure::NotPublished => f.write_str("track is not published"),
            SubscribeFailure::Transport(msg) => write!(f, "transport error: {}", msg),
            SubscribeFailure::Timeout => f.write_str("timed out"),
            SubscribeFailure::Rejected(msg) => write!(f, "rejected: {}", msg),
        }
    }
}

/// Subscribing to one remote track failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Could not subscribe to {kind} of {participant_id}: {failure}")]
pub struct SubscribeError {
    /// Remote participant
    pub participant_id: ParticipantId,
    /// Track kind
    pub kind: MediaKind,
    /// What went wrong
    pub failure: SubscribeFailure,
}

impl SubscribeError {
    /// Create a subscribe error
    pub fn new(participant_id: ParticipantId, kind: MediaKind, failure: SubscribeFailure) -> Self {
        Self {
            participant_id,
            kind,
            failure,
        }
    }

    /// Whether trying again could succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self.failure,
            SubscribeFailure::Transport(_) | SubscribeFailure::Timeout
        )
    }
}

/// Terminal outcome of a failed `join()`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    /// No credential could be obtained
    #[error("{0}")]
    Credential(#[from] CredentialError),

    /// The hub connection or publish step failed
    #[error("{0}")]
    Connect(#[from] ConnectError),

    /// A join or teardown is already running
    #[error("A session is already active (state: {state})")]
    AlreadyActive { state: ConnectionState },

    /// `leave()` was requested before the join finished
    #[error("Join was cancelled because the session was left")]
    Aborted,
}

impl JoinError {
    /// Whether the failure happened before any resource was held
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, JoinError::Credential(_))
    }
}

/// Configuration loading or validation failed
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration sources could not be read or decoded
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is out of range or inconsistent
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    /// The logging subscriber could not be installed
    #[error("Logging setup failed: {message}")]
    Logging { message: String },
}

impl ConfigError {
    /// Create an invalid-configuration error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}
