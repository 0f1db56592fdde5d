use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::Gate;
use crate::credential::CredentialFetcher;
use crate::error::{CredentialError, CredentialResult};
use crate::types::{JoinCredential, ParticipantId, SessionId};

/// Credential fetcher answering every request the same way
#[derive(Debug)]
pub struct StaticCredentialFetcher {
    response: CredentialResult<JoinCredential>,
    gate: Option<Gate>,
    calls: AtomicUsize,
}

impl StaticCredentialFetcher {
    /// Always hand out `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            response: Ok(JoinCredential::new(token)),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always fail with `error`
    pub fn failing(error: CredentialError) -> Self {
        Self {
            response: Err(error),
            gate: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Hold each fetch until `gate` opens
    pub fn with_gate(mut self, gate: Gate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Number of fetches so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CredentialFetcher for StaticCredentialFetcher {
    async fn fetch(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
    ) -> CredentialResult<JoinCredential> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(session_id = %session_id, participant_id = %participant_id, "Simulated credential fetch");

        if let Some(gate) = &self.gate {
            gate.pass().await;
        }
        self.response.clone()
    }
}
