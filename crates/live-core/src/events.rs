//! UI-facing event stream
//!
//! The coordinator reports everything a presentation layer may want to react
//! to as a [`LiveSessionEvent`] on a broadcast channel. Emitting never blocks
//! and never fails: slow or absent receivers simply miss events. The
//! authoritative connection state is also available as a `watch` channel from
//! [`SessionCoordinator::state_changes`](crate::SessionCoordinator::state_changes).

use std::fmt;

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::coordinator::ConnectionState;
use crate::error::MediaAcquisitionError;
use crate::types::{HubConnectionState, MediaKind, ParticipantId, SessionId};

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// The user pressed leave
    UserLeft,
    /// The view owning the session went away
    Unmounted,
    /// The hub dropped the connection
    Disconnected { detail: Option<String> },
    /// The join failed after resources were acquired
    JoinFailed,
    /// The join was abandoned before it finished
    JoinAborted,
}

impl EndReason {
    /// Whether the user should be offered to rejoin
    pub fn is_unexpected(&self) -> bool {
        matches!(self, EndReason::Disconnected { .. })
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::UserLeft => f.write_str("you left the session"),
            EndReason::Unmounted => f.write_str("the session view was closed"),
            EndReason::Disconnected { .. } => f.write_str("session ended, please rejoin"),
            EndReason::JoinFailed => f.write_str("could not join the session"),
            EndReason::JoinAborted => f.write_str("joining was cancelled"),
        }
    }
}

/// Events emitted by the coordinator
#[derive(Debug, Clone)]
pub enum LiveSessionEvent {
    /// The coordinator moved to a new state
    StateChanged {
        /// State before the transition
        previous: ConnectionState,
        /// State after the transition
        current: ConnectionState,
    },

    /// No local device could be opened; joining as listener only
    ListenerOnly {
        /// What went wrong while opening devices
        error: MediaAcquisitionError,
    },

    /// A join attempt failed terminally
    JoinFailed {
        /// The session that could not be joined
        session_id: SessionId,
        /// Human-readable cause
        cause: String,
    },

    /// A remote participant started or stopped providing a kind of media
    RemoteMediaChanged {
        /// Remote participant
        participant_id: ParticipantId,
        /// Media kind
        kind: MediaKind,
        /// Whether a track of that kind is now available
        available: bool,
    },

    /// A remote participant left the session
    RemoteParticipantLeft {
        /// Remote participant
        participant_id: ParticipantId,
    },

    /// Subscribing to a remote track failed after all retries
    SubscribeFailed {
        /// Remote participant
        participant_id: ParticipantId,
        /// Media kind
        kind: MediaKind,
        /// Human-readable cause
        cause: String,
    },

    /// The hub lost the connection and is trying to restore it
    ConnectionInterrupted {
        /// The hub-reported state
        state: HubConnectionState,
    },

    /// The hub restored the connection
    ConnectionRestored,

    /// The hub reported a non-fatal exception
    HubException {
        /// Hub-specific code
        code: i32,
        /// Optional description
        message: Option<String>,
    },

    /// A local track was muted or unmuted
    LocalMediaToggled {
        /// Which track
        kind: MediaKind,
        /// New mute state
        muted: bool,
    },

    /// Teardown finished and the coordinator is idle again
    SessionEnded {
        /// The session that ended
        session_id: SessionId,
        /// Why it ended
        reason: EndReason,
    },
}

/// Event stream type
pub type EventStream = BroadcastStream<LiveSessionEvent>;

/// Simple event iterator that doesn't require StreamExt
pub struct EventIterator {
    stream: EventStream,
}

impl EventIterator {
    /// Create a new event iterator from a stream
    pub fn new(stream: EventStream) -> Self {
        Self { stream }
    }

    /// Get the next event, skipping over notifications about missed events
    pub async fn next(&mut self) -> Option<LiveSessionEvent> {
        use tokio_stream::StreamExt;
        loop {
            match self.stream.next().await {
                Some(Ok(event)) => return Some(event),
                Some(Err(lagged)) => {
                    tracing::debug!("Event receiver lagged: {}", lagged);
                }
                None => return None,
            }
        }
    }
}

/// Event emitter for the coordinator
#[derive(Clone)]
pub struct EventEmitter {
    sender: broadcast::Sender<LiveSessionEvent>,
}

impl EventEmitter {
    /// Create a new event emitter with the specified capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Emit an event
    pub fn emit(&self, event: LiveSessionEvent) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> EventStream {
        BroadcastStream::new(self.sender.subscribe())
    }

    /// Subscribe to events with a simple iterator
    pub fn subscribe_simple(&self) -> EventIterator {
        EventIterator::new(self.subscribe())
    }

    /// Get the number of active receivers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
