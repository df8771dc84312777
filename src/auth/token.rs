use crate::error::{RelayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// A bearer credential issued by the upstream service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at,
        }
    }

    /// True while `expires_at` is strictly after `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("bearer {}", self.access_token)
    }
}

/// Exchanges client credentials for a bearer token.
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self) -> Result<Credential>;
}

/// Caches one credential and refreshes it when it has expired.
///
/// Refresh happens while holding the cache lock, so callers that arrive
/// during a refresh wait for it and then reuse its result instead of
/// issuing their own request.
pub struct TokenCache {
    authenticator: Arc<dyn Authenticator>,
    credential: Mutex<Option<Credential>>,
}

impl TokenCache {
    pub fn new(authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            authenticator,
            credential: Mutex::new(None),
        }
    }

    /// Return a credential that is still valid at the moment of return.
    pub async fn get(&self) -> Result<Credential> {
        let mut slot = self.credential.lock().await;

        // Expiry is checked against the clock now, not when the token was cached.
        if let Some(cached) = slot.as_ref() {
            if cached.is_valid_at(Utc::now()) {
                debug!("Using cached upstream credential");
                return Ok(cached.clone());
            }
            info!("Cached upstream credential expired at {}", cached.expires_at);
        }

        info!("Refreshing upstream credential");
        let fresh = self.authenticator.authenticate().await?;

        if !fresh.is_valid_at(Utc::now()) {
            warn!("Authentication returned an already expired credential");
            *slot = None;
            return Err(RelayError::auth(format!(
                "credential expired at {} on arrival",
                fresh.expires_at
            )));
        }

        info!("Upstream credential valid until {}", fresh.expires_at);
        *slot = Some(fresh.clone());

        Ok(fresh)
    }

    /// Drop the cached credential so the next `get` refreshes.
    pub async fn invalidate(&self) {
        self.credential.lock().await.take();
    }
}
