//! Capture device abstraction
//!
//! A [`MediaDeviceBackend`] opens platform capture devices; the
//! [`LocalMediaManager`](super::LocalMediaManager) wraps each opened device in a
//! [`LocalTrack`] that it owns exclusively. Everyone else only sees
//! [`LocalTrackRef`]s.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::MediaAcquisitionError;
use crate::types::{MediaKind, TrackId};

/// An opened microphone or camera
pub trait CaptureDevice: Send + Sync + fmt::Debug {
    /// Human-readable device name
    fn label(&self) -> &str;

    /// What the device captures
    fn kind(&self) -> MediaKind;

    /// Enable or disable capture without closing the device
    fn set_enabled(&self, enabled: bool);

    /// Whether capture is currently enabled
    fn is_enabled(&self) -> bool;

    /// Stop capturing and close the device. Calling it again is a no-op.
    fn stop(&self);

    /// `false` once the device was stopped
    fn is_live(&self) -> bool;
}

/// Platform capability for opening capture devices
#[async_trait]
pub trait MediaDeviceBackend: Send + Sync {
    /// Open the default device of `kind`
    ///
    /// May suspend for a long time, e.g. while a permission prompt is shown.
    async fn open(&self, kind: MediaKind) -> Result<Arc<dyn CaptureDevice>, MediaAcquisitionError>;
}

/// A local track owned by the media manager
#[derive(Debug)]
pub struct LocalTrack {
    id: TrackId,
    device: Arc<dyn CaptureDevice>,
}

impl LocalTrack {
    pub(crate) fn new(device: Arc<dyn CaptureDevice>) -> Self {
        Self {
            id: TrackId::generate(),
            device,
        }
    }

    /// Track id
    pub fn id(&self) -> &TrackId {
        &self.id
    }

    /// Media kind
    pub fn kind(&self) -> MediaKind {
        self.device.kind()
    }

    /// Borrowable reference for publishing and rendering
    pub fn reference(&self) -> LocalTrackRef {
        LocalTrackRef {
            id: self.id.clone(),
            kind: self.device.kind(),
            label: self.device.label().to_string(),
            device: Arc::clone(&self.device),
        }
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.device.set_enabled(enabled);
    }

    /// Stop the underlying device, consuming the track
    pub(crate) fn close(self) {
        tracing::debug!(track_id = %self.id, kind = %self.kind(), "Closing local track");
        self.device.stop();
    }
}

/// Non-owning reference to a local track
///
/// Handed to the hub for the duration of a publish and to render surfaces.
/// Holding one never keeps the device open.
#[derive(Clone)]
pub struct LocalTrackRef {
    id: TrackId,
    kind: MediaKind,
    label: String,
    device: Arc<dyn CaptureDevice>,
}

impl LocalTrackRef {
    /// Track id
    pub fn id(&self) -> &TrackId {
        &self.id
    }

    /// Media kind
    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Device label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the referenced track is still open
    pub fn is_open(&self) -> bool {
        self.device.is_live()
    }

    /// Whether the referenced track is capturing (open and not muted)
    pub fn is_enabled(&self) -> bool {
        self.device.is_live() && self.device.is_enabled()
    }
}

impl fmt::Debug for LocalTrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalTrackRef")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("open", &self.is_open())
            .finish()
    }
}

impl PartialEq for LocalTrackRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
