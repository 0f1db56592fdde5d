//! In-process stand-ins for the external collaborators
//!
//! Used by the demo binary and by tests: a credential service answering from
//! memory, capture devices with scripted availability, and a loopback hub whose
//! remote participants are driven by the caller. [`Gate`] holds any of them
//! pending to exercise races deterministically.

mod credentials;
mod devices;
mod gate;
mod hub;

pub use credentials::StaticCredentialFetcher;
pub use devices::{DeviceAvailability, SimulatedDevice, SimulatedDevices};
pub use gate::Gate;
pub use hub::{HubStats, LoopbackHub};
