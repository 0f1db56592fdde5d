//! Lifetime binding between a view and its session

use tracing::{debug, warn};

use super::coordinator::SessionCoordinator;
use crate::events::EndReason;

/// Leaves the session when dropped
///
/// Returned by [`SessionCoordinator::mount`]. The leave runs on the current
/// tokio runtime through the same path as an explicit
/// [`leave`](SessionCoordinator::leave).
#[must_use = "dropping the guard immediately leaves the session"]
pub struct MountGuard {
    coordinator: Option<SessionCoordinator>,
}

impl MountGuard {
    pub(super) fn new(coordinator: SessionCoordinator) -> Self {
        Self {
            coordinator: Some(coordinator),
        }
    }

    /// The guarded coordinator
    pub fn coordinator(&self) -> Option<&SessionCoordinator> {
        self.coordinator.as_ref()
    }

    /// Leave now and wait for teardown to finish
    pub async fn unmount(mut self) {
        if let Some(coordinator) = self.coordinator.take() {
            coordinator.leave_with(EndReason::Unmounted).await;
        }
    }
}

impl Drop for MountGuard {
    fn drop(&mut self) {
        let Some(coordinator) = self.coordinator.take() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                debug!(state = %coordinator.state(), "View unmounted, leaving session");
                runtime.spawn(async move {
                    coordinator.leave_with(EndReason::Unmounted).await;
                });
            }
            Err(_) => {
                warn!("View unmounted outside a tokio runtime, session left running");
            }
        }
    }
}
