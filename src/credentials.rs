// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Entra ID client-credentials token acquisition for the management plane.

use std::fmt;
use std::time::Duration;

use reqwest::Client as HttpClient;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::config::AzureIdentity;
use crate::constants::{ARM_SCOPE, TOKEN_REFRESH_MARGIN_SECS};
use crate::errors::ArmError;

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Service principal credential that caches its bearer token.
pub struct ClientSecretCredential {
    http: HttpClient,
    token_url: String,
    client_id: String,
    client_secret: String,
    cached: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for ClientSecretCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSecretCredential")
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl ClientSecretCredential {
    /// Create a credential for `identity` against `authority_host`.
    #[must_use]
    pub fn new(http: HttpClient, authority_host: &str, identity: &AzureIdentity) -> Self {
        Self {
            http,
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                authority_host.trim_end_matches('/'),
                identity.tenant_id
            ),
            client_id: identity.client_id.clone(),
            client_secret: identity.client_secret.clone(),
            cached: Mutex::new(None),
        }
    }

    /// Return a valid bearer token, requesting a new one when the cached
    /// token is missing or close to expiry.
    ///
    /// # Errors
    ///
    /// Returns [`ArmError::Credential`] if the token endpoint cannot be
    /// reached or rejects the request.
    pub async fn token(&self) -> Result<String, ArmError> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.value.clone());
            }
        }

        debug!(token_url = %self.token_url, "Requesting management-plane access token");

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", &self.client_secret)
            .append_pair("scope", ARM_SCOPE)
            .finish();

        let response = self
            .http
            .post(&self.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| ArmError::Credential(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ArmError::Credential(format!(
                "token endpoint returned {status}: {text}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ArmError::Credential(format!("invalid token response: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(TOKEN_REFRESH_MARGIN_SECS));
        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}

#[cfg(test)]
#[path = "credentials_tests.rs"]
mod credentials_tests;
