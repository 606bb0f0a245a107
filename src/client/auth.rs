//! Authentication against the Rackspace Identity service

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::settings::AuthConfig;
use crate::{RcbuError, RcbuResult};

/// Tokens are refreshed this long before the identity service says they expire
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Source of the `X-Auth-Token` sent with every API call
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn auth_token(&self) -> RcbuResult<String>;

    fn username(&self) -> Option<String>;
}

/// A token obtained out of band
#[derive(Debug, Clone)]
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticToken {
    async fn auth_token(&self) -> RcbuResult<String> {
        Ok(self.token.clone())
    }

    fn username(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    id: String,
    expires: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
    access: IdentityAccess,
}

#[derive(Debug, Deserialize)]
struct IdentityAccess {
    token: IdentityToken,
}

#[derive(Debug, Deserialize)]
struct IdentityToken {
    id: String,
    expires: DateTime<Utc>,
}

/// Username + API key authentication (Identity v2.0, `RAX-KSKEY` extension)
pub struct IdentityAuthenticator {
    http: reqwest::Client,
    identity_url: String,
    username: String,
    api_key: String,
    cached: Mutex<Option<CachedToken>>,
}

impl IdentityAuthenticator {
    pub fn new(
        http: reqwest::Client,
        identity_url: impl Into<String>,
        username: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            http,
            identity_url: identity_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            api_key: api_key.into(),
            cached: Mutex::new(None),
        }
    }

    async fn authenticate(&self) -> RcbuResult<CachedToken> {
        let uri = format!("{}/v2.0/tokens", self.identity_url);
        let body = json!({
            "auth": {
                "RAX-KSKEY:apiKeyCredentials": {
                    "username": self.username,
                    "apiKey": self.api_key,
                }
            }
        });

        debug!("Requesting token for {} from {}", self.username, uri);
        let response = self.http.post(&uri).json(&body).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            let text = response.text().await.unwrap_or_default();
            return Err(RcbuError::authentication(format!(
                "identity service returned {} for user {}: {}",
                status, self.username, text
            )));
        }

        let identity: IdentityResponse = response.json().await?;
        info!(
            "Authenticated {} (token expires {})",
            self.username, identity.access.token.expires
        );
        Ok(CachedToken {
            id: identity.access.token.id,
            expires: identity.access.token.expires,
        })
    }
}

#[async_trait]
impl Authenticator for IdentityAuthenticator {
    async fn auth_token(&self) -> RcbuResult<String> {
        let mut cached = self.cached.lock().await;
        let margin = ChronoDuration::seconds(EXPIRY_MARGIN_SECS);

        if let Some(token) = cached.as_ref() {
            if token.expires - margin > Utc::now() {
                return Ok(token.id.clone());
            }
            debug!("Cached token for {} expired, re-authenticating", self.username);
        }

        let token = self.authenticate().await?;
        let id = token.id.clone();
        *cached = Some(token);
        Ok(id)
    }

    fn username(&self) -> Option<String> {
        Some(self.username.clone())
    }
}

/// Static token when configured, otherwise username + API key
pub fn from_settings(auth: &AuthConfig, http: reqwest::Client) -> RcbuResult<Arc<dyn Authenticator>> {
    if let Some(token) = &auth.token {
        return Ok(Arc::new(StaticToken::new(token.clone())));
    }

    match (&auth.username, &auth.api_key) {
        (Some(username), Some(api_key)) => Ok(Arc::new(IdentityAuthenticator::new(
            http,
            auth.identity_url.clone(),
            username.clone(),
            api_key.clone(),
        ))),
        _ => Err(RcbuError::configuration(
            "no credentials: set auth.token, or auth.username and auth.api_key",
        )),
    }
}
