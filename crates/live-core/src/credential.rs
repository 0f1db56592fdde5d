//! Join credential acquisition
//!
//! A [`CredentialFetcher`] makes exactly one request per call. Retrying a
//! failed fetch is the job of whoever calls `join()` again.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::CredentialEndpointConfig;
use crate::error::{CredentialError, CredentialResult};
use crate::types::{JoinCredential, ParticipantId, SessionId};

/// Source of join credentials
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialFetcher: Send + Sync {
    /// Request a credential allowing `participant_id` to join `session_id`
    async fn fetch(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
    ) -> CredentialResult<JoinCredential>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    session_id: &'a str,
    participant_id: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
}

/// Credential fetcher talking to an HTTP token endpoint
///
/// Sends `POST {"sessionId", "participantId"}` with the configured bearer
/// token and expects `{"token", "expiresIn"?, "expiresAt"?}` back.
#[derive(Debug, Clone)]
pub struct HttpCredentialFetcher {
    client: reqwest::Client,
    endpoint: url::Url,
    bearer_token: Option<String>,
}

impl HttpCredentialFetcher {
    /// Create a fetcher for `endpoint` with the given request timeout
    pub fn new(endpoint: &str, timeout: Duration) -> CredentialResult<Self> {
        let endpoint = url::Url::parse(endpoint).map_err(|e| {
            CredentialError::configuration(format!("invalid endpoint '{}': {}", endpoint, e))
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CredentialError::configuration(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            bearer_token: None,
        })
    }

    /// Build a fetcher from the `credential` configuration section
    pub fn from_config(config: &CredentialEndpointConfig) -> CredentialResult<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| CredentialError::configuration("no credential endpoint configured"))?;

        let mut fetcher = Self::new(endpoint, config.timeout())?;
        fetcher.bearer_token = config.bearer_token.clone();
        Ok(fetcher)
    }

    /// Present `token` as the caller's bearer credential
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// The endpoint requests are sent to
    pub fn endpoint(&self) -> &url::Url {
        &self.endpoint
    }
}

#[async_trait]
impl CredentialFetcher for HttpCredentialFetcher {
    async fn fetch(
        &self,
        session_id: &SessionId,
        participant_id: &ParticipantId,
    ) -> CredentialResult<JoinCredential> {
        debug!(
            session_id = %session_id,
            participant_id = %participant_id,
            endpoint = %self.endpoint,
            "Requesting join credential"
        );

        let mut request = self.client.post(self.endpoint.clone()).json(&TokenRequest {
            session_id: session_id.as_str(),
            participant_id: participant_id.as_str(),
        });
        if let Some(bearer) = &self.bearer_token {
            request = request.bearer_auth(bearer);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CredentialError::network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            warn!(session_id = %session_id, status = status.as_u16(), "Credential request refused");
            return Err(CredentialError::Unauthorized {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(session_id = %session_id, status = status.as_u16(), "Credential request rejected");
            return Err(CredentialError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialError::malformed(e.to_string()))?;

        let token = body
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| CredentialError::malformed("response has no token"))?;

        let mut credential = JoinCredential::new(token);
        if let Some(expires_at) = body.expires_at {
            credential = credential.with_expiry(expires_at);
        } else if let Some(seconds) = body.expires_in {
            credential = credential.expiring_in(Duration::from_secs(seconds));
        }

        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_uses_camel_case() {
        let body = serde_json::to_value(TokenRequest {
            session_id: "class_42",
            participant_id: "instructor-1",
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"sessionId": "class_42", "participantId": "instructor-1"})
        );
    }

    #[test]
    fn test_from_config_requires_endpoint() {
        let err = HttpCredentialFetcher::from_config(&CredentialEndpointConfig::default()).unwrap_err();
        assert!(matches!(err, CredentialError::Configuration { .. }));
    }

    #[test]
    fn test_invalid_endpoint_is_a_configuration_error() {
        let err = HttpCredentialFetcher::new("::nope::", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, CredentialError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_mock_fetcher_is_usable_as_trait_object() {
        let mut mock = MockCredentialFetcher::new();
        mock.expect_fetch()
            .times(1)
            .returning(|_, _| Ok(JoinCredential::new("tok")));

        let fetcher: Box<dyn CredentialFetcher> = Box::new(mock);
        let credential = fetcher
            .fetch(&SessionId::for_class(1), &ParticipantId::from("p"))
            .await
            .unwrap();
        assert_eq!(credential.token(), "tok");
    }
}
