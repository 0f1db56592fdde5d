//! Render surface capability
//!
//! Pixels are drawn by the presentation layer. Once a track reference exists
//! it can be attached to a [`RenderSurface`]; this crate never renders itself.

use parking_lot::Mutex;

use crate::media::LocalTrackRef;
use crate::registry::RemoteTrack;
use crate::types::{MediaKind, ParticipantId, TrackId};

/// What is being attached
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSource {
    /// Local preview
    Local { track_id: TrackId, kind: MediaKind },
    /// Media of a remote participant
    Remote {
        track_id: TrackId,
        participant_id: ParticipantId,
        kind: MediaKind,
    },
}

impl TrackSource {
    /// Track id
    pub fn track_id(&self) -> &TrackId {
        match self {
            TrackSource::Local { track_id, .. } | TrackSource::Remote { track_id, .. } => track_id,
        }
    }
}

/// A display surface a track can be attached to
pub trait RenderSurface: Send + Sync {
    /// Start showing (or playing) `source`
    fn attach(&self, source: TrackSource);

    /// Stop showing the track
    fn detach(&self, track_id: &TrackId);
}

impl LocalTrackRef {
    /// Attach this track as local preview; closed tracks are not attached
    pub fn attach_to(&self, surface: &dyn RenderSurface) -> bool {
        if !self.is_open() {
            return false;
        }
        surface.attach(TrackSource::Local {
            track_id: self.id().clone(),
            kind: self.kind(),
        });
        true
    }
}

impl RemoteTrack {
    /// Attach this remote track to a surface
    pub fn attach_to(&self, surface: &dyn RenderSurface) {
        surface.attach(TrackSource::Remote {
            track_id: self.id.clone(),
            participant_id: self.participant_id.clone(),
            kind: self.kind,
        });
    }
}

/// Surface that only logs and remembers what is attached
#[derive(Debug, Default)]
pub struct LoggingSurface {
    name: String,
    attached: Mutex<Vec<TrackSource>>,
}

impl LoggingSurface {
    /// Create a named surface
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attached: Mutex::new(Vec::new()),
        }
    }

    /// Sources currently attached
    pub fn attached(&self) -> Vec<TrackSource> {
        self.attached.lock().clone()
    }
}

impl RenderSurface for LoggingSurface {
    fn attach(&self, source: TrackSource) {
        tracing::info!(surface = %self.name, source = ?source, "Attached track");
        let mut attached = self.attached.lock();
        if !attached.iter().any(|s| s.track_id() == source.track_id()) {
            attached.push(source);
        }
    }

    fn detach(&self, track_id: &TrackId) {
        let mut attached = self.attached.lock();
        attached.retain(|s| s.track_id() != track_id);
        tracing::info!(surface = %self.name, track_id = %track_id, "Detached track");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_attach_and_detach() {
        let surface = LoggingSurface::new("grid");
        let track = RemoteTrack::new(
            TrackId("t1".into()),
            ParticipantId::from("userA"),
            MediaKind::Video,
        );

        track.attach_to(&surface);
        track.attach_to(&surface);
        assert_eq!(surface.attached().len(), 1);

        surface.detach(&track.id);
        assert!(surface.attached().is_empty());
    }
}
