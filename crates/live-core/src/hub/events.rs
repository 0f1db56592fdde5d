//! Hub event channel
//!
//! Hub SDKs deliver events through callbacks. Adapters forward each callback
//! into a [`HubEventSink`]; the coordinator drains the matching
//! [`HubEventReceiver`] from a single task, so events are applied in emission
//! order. Dropping every sink ends the stream.

use tokio::sync::mpsc;

use crate::types::{HubConnectionState, MediaKind, ParticipantId};

/// Events reported by the hub
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// A remote participant started publishing `kind`
    RemotePublished {
        participant_id: ParticipantId,
        kind: MediaKind,
    },
    /// A remote participant stopped publishing `kind`
    RemoteUnpublished {
        participant_id: ParticipantId,
        kind: MediaKind,
    },
    /// A remote participant left the session
    RemoteLeft { participant_id: ParticipantId },
    /// The hub connection changed state
    ConnectionStateChanged {
        previous: HubConnectionState,
        current: HubConnectionState,
        /// Hub-provided reason, if any
        reason: Option<String>,
    },
    /// Non-fatal hub exception
    Exception { code: i32, message: Option<String> },
}

impl HubEvent {
    /// Short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            HubEvent::RemotePublished { .. } => "remote-published",
            HubEvent::RemoteUnpublished { .. } => "remote-unpublished",
            HubEvent::RemoteLeft { .. } => "remote-left",
            HubEvent::ConnectionStateChanged { .. } => "connection-state-changed",
            HubEvent::Exception { .. } => "exception",
        }
    }
}

/// Create a connected sink/receiver pair
pub fn hub_event_channel() -> (HubEventSink, HubEventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (HubEventSink { tx }, HubEventReceiver { rx })
}

/// Sending half handed to the [`SessionClient`](super::SessionClient)
#[derive(Debug, Clone)]
pub struct HubEventSink {
    tx: mpsc::UnboundedSender<HubEvent>,
}

impl HubEventSink {
    /// Forward an event; returns `false` once the receiver is gone
    pub fn emit(&self, event: HubEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    /// Whether the receiving side was dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half consumed by the coordinator's event loop
#[derive(Debug)]
pub struct HubEventReceiver {
    rx: mpsc::UnboundedReceiver<HubEvent>,
}

impl HubEventReceiver {
    /// Next event, `None` once every sink was dropped and the queue is empty
    pub async fn recv(&mut self) -> Option<HubEvent> {
        self.rx.recv().await
    }
}
