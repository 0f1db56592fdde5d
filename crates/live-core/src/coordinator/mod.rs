//! Session coordination
//!
//! The [`SessionCoordinator`] owns the connection state machine, sequences
//! credential fetch, device acquisition, connect and publish, consumes hub
//! events, and owns the teardown protocol that releases every resource exactly
//! once whatever the exit path.

mod builder;
mod cleanup;
mod coordinator;
mod event_handler;
mod mount;
mod session_ops;
mod state;

pub use builder::CoordinatorBuilder;
pub use cleanup::{CleanupGuard, JoinTicket};
pub use coordinator::SessionCoordinator;
pub use mount::MountGuard;
pub use session_ops::JoinOutcome;
pub use state::ConnectionState;
