use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::Gate;
use crate::error::{MediaAcquisitionError, MediaErrorKind};
use crate::media::{CaptureDevice, MediaDeviceBackend};
use crate::types::MediaKind;

/// How a simulated device responds to `open`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceAvailability {
    /// Opens fine
    Available,
    /// The user refused access
    Denied,
    /// No such device
    Missing,
    /// Held by another application
    Busy,
    /// Fails for an unclassified reason
    Faulty,
}

/// A simulated microphone or camera
#[derive(Debug)]
pub struct SimulatedDevice {
    label: String,
    kind: MediaKind,
    enabled: AtomicBool,
    live: AtomicBool,
}

impl SimulatedDevice {
    fn new(kind: MediaKind, serial: usize) -> Self {
        let label = match kind {
            MediaKind::Audio => format!("Simulated Microphone #{}", serial),
            MediaKind::Video => format!("Simulated Camera #{}", serial),
        };
        Self {
            label,
            kind,
            enabled: AtomicBool::new(true),
            live: AtomicBool::new(true),
        }
    }
}

impl CaptureDevice for SimulatedDevice {
    fn label(&self) -> &str {
        &self.label
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn set_enabled(&self, enabled: bool) {
        if self.is_live() {
            self.enabled.store(enabled, Ordering::SeqCst);
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn stop(&self) {
        self.enabled.store(false, Ordering::SeqCst);
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

/// Device backend with scripted availability
#[derive(Debug)]
pub struct SimulatedDevices {
    availability: Mutex<HashMap<MediaKind, DeviceAvailability>>,
    gate: Option<Gate>,
    opened: Mutex<Vec<Arc<SimulatedDevice>>>,
    attempts: AtomicUsize,
}

impl SimulatedDevices {
    /// Both devices available
    pub fn new() -> Self {
        Self::all(DeviceAvailability::Available)
    }

    /// Both devices in the same condition
    pub fn all(availability: DeviceAvailability) -> Self {
        Self {
            availability: Mutex::new(
                MediaKind::ALL.iter().map(|kind| (*kind, availability)).collect(),
            ),
            gate: None,
            opened: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Set the condition of one device
    pub fn with(self, kind: MediaKind, availability: DeviceAvailability) -> Self {
        self.set_availability(kind, availability);
        self
    }

    /// Hold every open until `gate` opens
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Change the condition of one device
    pub fn set_availability(&self, kind: MediaKind, availability: DeviceAvailability) {
        self.availability.lock().insert(kind, availability);
    }

    /// Calls to `open`, successful or not
    pub fn open_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Devices handed out
    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    /// Devices handed out and since stopped
    pub fn stop_count(&self) -> usize {
        self.opened.lock().iter().filter(|d| !d.is_live()).count()
    }

    /// Devices handed out and still running
    pub fn live_count(&self) -> usize {
        self.opened.lock().iter().filter(|d| d.is_live()).count()
    }

    fn availability(&self, kind: MediaKind) -> DeviceAvailability {
        self.availability
            .lock()
            .get(&kind)
            .copied()
            .unwrap_or(DeviceAvailability::Missing)
    }
}

impl Default for SimulatedDevices {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaDeviceBackend for SimulatedDevices {
    async fn open(&self, kind: MediaKind) -> Result<Arc<dyn CaptureDevice>, MediaAcquisitionError> {
        let serial = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(gate) = &self.gate {
            gate.pass().await;
        }

        match self.availability(kind) {
            DeviceAvailability::Available => {
                let device = Arc::new(SimulatedDevice::new(kind, serial));
                self.opened.lock().push(device.clone());
                Ok(device as Arc<dyn CaptureDevice>)
            }
            DeviceAvailability::Denied => Err(MediaAcquisitionError::permission_denied(kind)),
            DeviceAvailability::Missing => Err(MediaAcquisitionError::not_found(kind)),
            DeviceAvailability::Busy => Err(MediaAcquisitionError::in_use(kind)),
            DeviceAvailability::Faulty => Err(MediaAcquisitionError::new(
                MediaErrorKind::Unknown,
                kind,
                "device failed to start",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_availability_maps_to_error_kind() {
        let devices = SimulatedDevices::all(DeviceAvailability::Busy)
            .with(MediaKind::Audio, DeviceAvailability::Faulty);

        let video = devices.open(MediaKind::Video).await.unwrap_err();
        assert_eq!(video.kind, MediaErrorKind::InUse);
        let audio = devices.open(MediaKind::Audio).await.unwrap_err();
        assert_eq!(audio.kind, MediaErrorKind::Unknown);

        assert_eq!(devices.open_attempts(), 2);
        assert_eq!(devices.open_count(), 0);
    }

    #[tokio::test]
    async fn test_stopped_device_cannot_be_enabled() {
        let devices = SimulatedDevices::new();
        let device = devices.open(MediaKind::Audio).await.unwrap();

        device.stop();
        device.stop();
        device.set_enabled(true);
        assert!(!device.is_enabled());
        assert_eq!(devices.stop_count(), 1);
    }
}
