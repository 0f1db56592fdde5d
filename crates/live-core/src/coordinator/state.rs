//! Coordinator state machine
//!
//! ```text
//! Idle -> FetchingCredential -> AcquiringMedia -> Connecting -> Joined
//!              |                      |               |           |
//!              +--> Idle              +-------> LeavingOrError <--+
//!              +------------------------------------^      |
//!                                                          v
//!                                                         Idle
//! ```

use std::fmt;

use serde::Serialize;

/// The single authoritative connection state of a coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionState {
    /// No resources held
    Idle,
    /// Waiting for the credential service
    FetchingCredential,
    /// Opening local devices (the hub connect may already be under way)
    AcquiringMedia,
    /// Waiting for connect and publish to settle
    Connecting,
    /// In the call
    Joined,
    /// Teardown is running
    LeavingOrError,
}

impl ConnectionState {
    /// Whether a join is in flight
    pub fn is_joining(self) -> bool {
        matches!(
            self,
            ConnectionState::FetchingCredential
                | ConnectionState::AcquiringMedia
                | ConnectionState::Connecting
        )
    }

    /// Whether the UI should show the call as connected
    pub fn is_joined(self) -> bool {
        self == ConnectionState::Joined
    }

    /// Whether `next` is a legal successor of `self`
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;

        matches!(
            (self, next),
            (Idle, FetchingCredential)
                | (FetchingCredential, AcquiringMedia)
                | (FetchingCredential, Idle)
                | (FetchingCredential, LeavingOrError)
                | (AcquiringMedia, Connecting)
                | (AcquiringMedia, LeavingOrError)
                | (Connecting, Joined)
                | (Connecting, LeavingOrError)
                | (Joined, LeavingOrError)
                | (LeavingOrError, Idle)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::FetchingCredential => "fetching-credential",
            ConnectionState::AcquiringMedia => "acquiring-media",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Joined => "joined",
            ConnectionState::LeavingOrError => "leaving",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::ConnectionState::{self, *};

    const ALL: [ConnectionState; 6] = [
        Idle,
        FetchingCredential,
        AcquiringMedia,
        Connecting,
        Joined,
        LeavingOrError,
    ];

    #[test]
    fn test_happy_path_is_legal() {
        let path = [Idle, FetchingCredential, AcquiringMedia, Connecting, Joined, LeavingOrError, Idle];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_only_credential_failure_skips_teardown() {
        for state in ALL {
            let direct_to_idle = state.can_transition_to(Idle);
            let expected = matches!(state, FetchingCredential | LeavingOrError);
            assert_eq!(direct_to_idle, expected, "{} -> idle", state);
        }
    }

    #[test]
    fn test_joined_is_only_reached_from_connecting() {
        for state in ALL {
            assert_eq!(state.can_transition_to(Joined), state == Connecting);
        }
    }

    #[test]
    fn test_no_self_transitions() {
        for state in ALL {
            assert!(!state.can_transition_to(state));
        }
    }

    #[test]
    fn test_joining_states() {
        assert!(AcquiringMedia.is_joining());
        assert!(!Joined.is_joining());
        assert!(!Idle.is_joining());
        assert!(Joined.is_joined());
    }
}
