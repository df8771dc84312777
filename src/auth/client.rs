use super::token::{Authenticator, Credential};
use crate::error::{RelayError, Result};
use chrono::DateTime;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

/// Body returned by `POST /v1/authenticate`
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    /// Unix timestamp (seconds)
    pub expire_at: i64,
}

impl AuthResponse {
    pub fn into_credential(self) -> Result<Credential> {
        if self.access_token.trim().is_empty() {
            return Err(RelayError::auth("empty access_token in response"));
        }

        let expires_at = DateTime::from_timestamp(self.expire_at, 0).ok_or_else(|| {
            RelayError::auth(format!("expire_at out of range: {}", self.expire_at))
        })?;

        Ok(Credential::new(self.access_token, expires_at))
    }
}

/// Form-encoded client-credential exchange against the upstream API
#[derive(Debug, Clone)]
pub struct HttpAuthenticator {
    client: reqwest::Client,
    endpoint: String,
    client_id: String,
    client_secret: String,
}

impl HttpAuthenticator {
    pub fn new(
        api_base: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RelayError::auth(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/v1/authenticate", api_base.trim_end_matches('/')),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait::async_trait]
impl Authenticator for HttpAuthenticator {
    async fn authenticate(&self) -> Result<Credential> {
        info!("Authenticating against {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| {
                error!("Authentication request failed: {}", e);
                RelayError::auth(format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::auth(format!(
                "authentication endpoint returned {}",
                status
            )));
        }

        let body: AuthResponse = response
            .json()
            .await
            .map_err(|e| RelayError::auth(format!("malformed authentication response: {}", e)))?;

        body.into_credential()
    }
}
