//! # classlive-core - Live Class Session Coordination
//!
//! This crate drives one participant's side of a live audio/video class:
//! - **credential**: fetch a short-lived join token for a session
//! - **media**: open, mute and release the local microphone and camera
//! - **hub**: the contract an adapter over the real-time hub SDK must honour
//! - **registry**: which remote participants are present and what they publish
//! - **coordinator**: the state machine tying it together, including a single
//!   teardown path that releases everything exactly once however a session ends
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use classlive_core::{CoordinatorBuilder, LiveSessionConfig, SessionId};
//! use classlive_core::sim::{LoopbackHub, SimulatedDevices, StaticCredentialFetcher};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let coordinator = CoordinatorBuilder::new()
//!         .participant("student-7")
//!         .config(LiveSessionConfig::new("classroom"))
//!         .credential_fetcher(Arc::new(StaticCredentialFetcher::new("token")))
//!         .session_client(Arc::new(LoopbackHub::new()))
//!         .media_backend(Arc::new(SimulatedDevices::new()))
//!         .build()?;
//!
//!     let joined = coordinator.join(SessionId::for_class(42)).await?;
//!     if joined.is_listener_only() {
//!         println!("joining as listener");
//!     }
//!
//!     coordinator.toggle_audio();
//!     coordinator.leave().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! Credential and connect failures are terminal for a join and come back from
//! [`SessionCoordinator::join`] after every acquired resource was released.
//! Device failures downgrade the join to listener-only. A failed subscription
//! to one remote track only affects that track. A dropped hub connection ends
//! the session as if `leave()` had been called.

pub mod config;
pub mod coordinator;
pub mod credential;
pub mod error;
pub mod events;
pub mod hub;
pub mod logging;
pub mod media;
pub mod recovery;
pub mod registry;
pub mod render;
pub mod sim;
pub mod types;

// Re-export main types
pub use config::{CredentialEndpointConfig, LiveSessionConfig, LocalMediaConfig, SubscribeRetryConfig};
pub use coordinator::{ConnectionState, CoordinatorBuilder, JoinOutcome, MountGuard, SessionCoordinator};
pub use credential::{CredentialFetcher, HttpCredentialFetcher};
pub use error::{
    ConfigError, ConnectError, ConnectErrorKind, CredentialError, JoinError, JoinResult,
    MediaAcquisitionError, MediaErrorKind, SubscribeError, SubscribeFailure,
};
pub use events::{EndReason, EventIterator, EventStream, LiveSessionEvent};
pub use hub::{HubEvent, HubEventSink, SessionClient};
pub use media::{LocalMediaManager, LocalMediaState, LocalTrackRef, MediaDeviceBackend};
pub use registry::{RemoteParticipant, RemoteParticipantRegistry, RemoteTrack};
pub use render::{RenderSurface, TrackSource};
pub use types::{
    HubConnectionState, JoinCredential, MediaKind, ParticipantHandle, ParticipantId, Session,
    SessionId, TrackId,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
