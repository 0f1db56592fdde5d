//! Live-session configuration
//!
//! [`LiveSessionConfig`] gathers everything the coordinator needs that is not a
//! collaborator: the hub application id, where to fetch join credentials, which
//! local devices to open, and how hard to try when subscribing to remote tracks.
//!
//! # Sources
//!
//! [`LiveSessionConfig::load`] layers, from lowest to highest precedence:
//!
//! 1. built-in defaults
//! 2. an optional configuration file (format picked from its extension)
//! 3. `CLASSLIVE_*` environment variables, nested keys separated by `__`
//!    (e.g. `CLASSLIVE_MEDIA__WANT_VIDEO=false`)
//!
//! ```rust
//! use classlive_core::LiveSessionConfig;
//!
//! let config = LiveSessionConfig::new("classroom-app")
//!     .with_credential_endpoint("https://api.example.com/live/token")
//!     .with_video(false);
//!
//! assert!(config.validate().is_ok());
//! assert!(!config.media.want_video);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::recovery::RetryConfig;

/// Environment variable prefix understood by [`LiveSessionConfig::load`]
pub const ENV_PREFIX: &str = "CLASSLIVE";

/// Top-level configuration for a [`SessionCoordinator`](crate::SessionCoordinator)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiveSessionConfig {
    /// Hub application id passed to `connect`
    pub app_id: String,
    /// Credential service settings
    pub credential: CredentialEndpointConfig,
    /// Local capture preferences
    pub media: LocalMediaConfig,
    /// Retry policy for remote track subscriptions
    pub subscribe_retry: SubscribeRetryConfig,
    /// Buffer size of the UI event stream
    pub event_capacity: usize,
    /// How long teardown waits for the hub event loop to drain
    pub event_drain_timeout_ms: u64,
}

impl Default for LiveSessionConfig {
    fn default() -> Self {
        Self {
            app_id: "classlive".to_string(),
            credential: CredentialEndpointConfig::default(),
            media: LocalMediaConfig::default(),
            subscribe_retry: SubscribeRetryConfig::default(),
            event_capacity: 256,
            event_drain_timeout_ms: 2000,
        }
    }
}

impl LiveSessionConfig {
    /// Create a configuration with defaults for everything but the app id
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        tracing::debug!(app_id = %config.app_id, "Loaded live session configuration");
        Ok(config)
    }

    /// Set the credential service endpoint
    pub fn with_credential_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.credential.endpoint = Some(endpoint.into());
        self
    }

    /// Set the bearer token presented to the credential service
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.credential.bearer_token = Some(token.into());
        self
    }

    /// Enable or disable microphone capture
    pub fn with_audio(mut self, enabled: bool) -> Self {
        self.media.want_audio = enabled;
        self
    }

    /// Enable or disable camera capture
    pub fn with_video(mut self, enabled: bool) -> Self {
        self.media.want_video = enabled;
        self
    }

    /// Replace the subscription retry policy
    pub fn with_subscribe_retry(mut self, retry: SubscribeRetryConfig) -> Self {
        self.subscribe_retry = retry;
        self
    }

    /// Set the UI event buffer size
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Teardown drain bound as a duration
    pub fn event_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.event_drain_timeout_ms)
    }

    /// Check values that the type system cannot
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_id.trim().is_empty() {
            return Err(ConfigError::invalid("app_id must not be empty"));
        }

        if self.event_capacity == 0 {
            return Err(ConfigError::invalid("event_capacity must be at least 1"));
        }

        if let Some(endpoint) = &self.credential.endpoint {
            url::Url::parse(endpoint).map_err(|e| {
                ConfigError::invalid(format!("credential endpoint '{}' is not a URL: {}", endpoint, e))
            })?;
        }

        self.subscribe_retry.validate()
    }
}

/// Where and how join credentials are requested
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialEndpointConfig {
    /// Token endpoint, `None` when credentials come from elsewhere
    pub endpoint: Option<String>,
    /// Bearer credential of the signed-in user
    pub bearer_token: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for CredentialEndpointConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            bearer_token: None,
            timeout_secs: 10,
        }
    }
}

impl CredentialEndpointConfig {
    /// Request timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which local devices to open and how they start out
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalMediaConfig {
    /// Open the microphone
    pub want_audio: bool,
    /// Open the camera
    pub want_video: bool,
    /// Join with the microphone muted
    pub start_audio_muted: bool,
    /// Join with the camera disabled
    pub start_video_muted: bool,
}

impl Default for LocalMediaConfig {
    fn default() -> Self {
        Self {
            want_audio: true,
            want_video: true,
            start_audio_muted: false,
            start_video_muted: false,
        }
    }
}

/// Retry policy for subscribing to remote tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscribeRetryConfig {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
    /// Growth factor between delays
    pub backoff_multiplier: f64,
    /// Randomize delays by roughly ±10%
    pub use_jitter: bool,
}

impl Default for SubscribeRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 2000,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

impl SubscribeRetryConfig {
    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Check the policy is usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("subscribe_retry.max_attempts must be at least 1"));
        }
        if self.backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "subscribe_retry.backoff_multiplier must be >= 1.0",
            ));
        }
        Ok(())
    }

    /// Convert into the generic retry policy
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
            use_jitter: self.use_jitter,
        }
    }
}
