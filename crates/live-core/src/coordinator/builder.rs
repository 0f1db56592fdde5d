//! Builder pattern for creating session coordinators

use std::sync::Arc;

use super::coordinator::SessionCoordinator;
use crate::config::{LiveSessionConfig, SubscribeRetryConfig};
use crate::credential::{CredentialFetcher, HttpCredentialFetcher};
use crate::error::ConfigError;
use crate::hub::SessionClient;
use crate::media::{LocalMediaManager, MediaDeviceBackend};
use crate::types::ParticipantId;

/// Builder wiring a coordinator to its collaborators
///
/// ```rust
/// use std::sync::Arc;
/// use classlive_core::{CoordinatorBuilder, LiveSessionConfig};
/// use classlive_core::sim::{LoopbackHub, SimulatedDevices, StaticCredentialFetcher};
///
/// let coordinator = CoordinatorBuilder::new()
///     .participant("instructor-1")
///     .config(LiveSessionConfig::new("classroom"))
///     .credential_fetcher(Arc::new(StaticCredentialFetcher::new("token")))
///     .session_client(Arc::new(LoopbackHub::new()))
///     .media_backend(Arc::new(SimulatedDevices::new()))
///     .build()
///     .unwrap();
///
/// assert!(!coordinator.is_joined());
/// ```
pub struct CoordinatorBuilder {
    participant_id: Option<ParticipantId>,
    config: LiveSessionConfig,
    fetcher: Option<Arc<dyn CredentialFetcher>>,
    client: Option<Arc<dyn SessionClient>>,
    backend: Option<Arc<dyn MediaDeviceBackend>>,
}

impl CoordinatorBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            participant_id: None,
            config: LiveSessionConfig::default(),
            fetcher: None,
            client: None,
            backend: None,
        }
    }

    /// Set the local participant identity (required)
    pub fn participant(mut self, participant_id: impl Into<ParticipantId>) -> Self {
        self.participant_id = Some(participant_id.into());
        self
    }

    /// Use a complete configuration
    pub fn config(mut self, config: LiveSessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the hub application id
    pub fn app_id(mut self, app_id: impl Into<String>) -> Self {
        self.config.app_id = app_id.into();
        self
    }

    /// Choose which local devices to open
    pub fn media(mut self, want_audio: bool, want_video: bool) -> Self {
        self.config.media.want_audio = want_audio;
        self.config.media.want_video = want_video;
        self
    }

    /// Set the retry policy for remote subscriptions
    pub fn subscribe_retry(mut self, retry: SubscribeRetryConfig) -> Self {
        self.config.subscribe_retry = retry;
        self
    }

    /// Set the credential source
    ///
    /// Optional when the configuration names a credential endpoint.
    pub fn credential_fetcher(mut self, fetcher: Arc<dyn CredentialFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Set the hub adapter (required)
    pub fn session_client(mut self, client: Arc<dyn SessionClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the capture device backend (required)
    pub fn media_backend(mut self, backend: Arc<dyn MediaDeviceBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Build the coordinator
    pub fn build(self) -> Result<SessionCoordinator, ConfigError> {
        self.validate()?;

        let participant_id = self
            .participant_id
            .ok_or_else(|| ConfigError::invalid("participant id is required"))?;
        let client = self
            .client
            .ok_or_else(|| ConfigError::invalid("a session client is required"))?;
        let backend = self
            .backend
            .ok_or_else(|| ConfigError::invalid("a media device backend is required"))?;

        let fetcher: Arc<dyn CredentialFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(
                HttpCredentialFetcher::from_config(&self.config.credential)
                    .map_err(|e| ConfigError::invalid(e.to_string()))?,
            ),
        };

        let media = LocalMediaManager::new(backend).with_initial_mute(
            self.config.media.start_audio_muted,
            self.config.media.start_video_muted,
        );

        tracing::debug!(
            participant_id = %participant_id,
            app_id = %self.config.app_id,
            "Building session coordinator"
        );
        Ok(SessionCoordinator::from_parts(
            participant_id,
            self.config,
            fetcher,
            client,
            media,
        ))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        match &self.participant_id {
            Some(id) if !id.as_str().trim().is_empty() => {}
            _ => return Err(ConfigError::invalid("participant id is required")),
        }

        if self.fetcher.is_none() && self.config.credential.endpoint.is_none() {
            return Err(ConfigError::invalid(
                "a credential fetcher or credential endpoint is required",
            ));
        }

        self.config.validate()
    }
}

impl Default for CoordinatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{LoopbackHub, SimulatedDevices, StaticCredentialFetcher};

    fn complete() -> CoordinatorBuilder {
        CoordinatorBuilder::new()
            .participant("p1")
            .credential_fetcher(Arc::new(StaticCredentialFetcher::new("t")))
            .session_client(Arc::new(LoopbackHub::new()))
            .media_backend(Arc::new(SimulatedDevices::new()))
    }

    #[test]
    fn test_builds_with_all_collaborators() {
        let coordinator = complete().app_id("school").build().unwrap();
        assert_eq!(coordinator.config().app_id, "school");
        assert_eq!(coordinator.participant_id().as_str(), "p1");
    }

    #[test]
    fn test_missing_participant_is_rejected() {
        let err = CoordinatorBuilder::new()
            .credential_fetcher(Arc::new(StaticCredentialFetcher::new("t")))
            .session_client(Arc::new(LoopbackHub::new()))
            .media_backend(Arc::new(SimulatedDevices::new()))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("participant"));
    }

    #[test]
    fn test_missing_credential_source_is_rejected() {
        let err = CoordinatorBuilder::new()
            .participant("p1")
            .session_client(Arc::new(LoopbackHub::new()))
            .media_backend(Arc::new(SimulatedDevices::new()))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("credential"));
    }

    #[test]
    fn test_endpoint_config_supplies_http_fetcher() {
        let config = LiveSessionConfig::new("school")
            .with_credential_endpoint("https://api.example.com/live/token");
        let coordinator = CoordinatorBuilder::new()
            .participant("p1")
            .config(config)
            .session_client(Arc::new(LoopbackHub::new()))
            .media_backend(Arc::new(SimulatedDevices::new()))
            .build();
        assert!(coordinator.is_ok());
    }
}
