//! Local capture: devices, tracks and the manager that owns them

pub mod device;
pub mod manager;

pub use device::{CaptureDevice, LocalTrack, LocalTrackRef, MediaDeviceBackend};
pub use manager::{AcquireOutcome, LocalMediaManager, LocalMediaState, MediaStats};
