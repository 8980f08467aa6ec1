// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! HTTPS client for the hosted backend.
//!
//! ## Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | Password sign-in | `POST /auth/v1/token?grant_type=password` |
//! | Session recovery | `GET /auth/v1/user` (or local JWKS verification) |
//! | Sign-out | `POST /auth/v1/logout` |
//! | Profile lookup | `GET /rest/v1/profiles?id=eq.{id}&select=...` |
//!
//! Every request carries the project `apikey` header. Requests on behalf of
//! a user (recovery, sign-out, profile lookup) authenticate with that user's
//! access token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::broadcast;
use url::Url;

use super::{
    AuthEvent, AuthProvider, AuthSession, JwksManager, Profile, ProfileStore, ProviderError,
};

/// Request timeout for backend calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Columns read from the profile table.
const PROFILE_COLUMNS: &str = "id,full_name,email,role,clinic_id,coach_id,client_id";

/// Capacity of the auth event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

/// Hosted backend client.
#[derive(Clone)]
pub struct RestBackend {
    base_url: Url,
    api_key: String,
    client: reqwest::Client,
    jwks: Option<JwksManager>,
    events: broadcast::Sender<AuthEvent>,
}

impl RestBackend {
    pub fn new(base_url: Url, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            base_url,
            api_key: api_key.into(),
            client,
            jwks: None,
            events,
        })
    }

    /// Verify access tokens locally with the backend's JWKS.
    pub fn with_jwks(mut self, jwks: JwksManager) -> Self {
        self.jwks = Some(jwks);
        self
    }

    pub fn jwks(&self) -> Option<&JwksManager> {
        self.jwks.as_ref()
    }

    pub fn http_client(&self) -> reqwest::Client {
        self.client.clone()
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|e| ProviderError::Transport(format!("invalid backend URL: {e}")))
    }

    async fn remote_user(&self, access_token: &str) -> Result<Option<AuthSession>, ProviderError> {
        let response = self
            .client
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Ok(None),
            status if !status.is_success() => return Err(http_error(response).await),
            _ => {}
        }

        let user: UserResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(Some(AuthSession {
            access_token: access_token.to_string(),
            user_id: user.id,
            email: user.email.unwrap_or_default(),
            expires_at: None,
        }))
    }
}

#[async_trait]
impl AuthProvider for RestBackend {
    async fn get_current_session(
        &self,
        access_token: &str,
    ) -> Result<Option<AuthSession>, ProviderError> {
        match &self.jwks {
            Some(jwks) => match jwks.verify(access_token).await {
                Ok(session) => Ok(Some(session)),
                Err(ProviderError::InvalidSession) => Ok(None),
                Err(e) => Err(e),
            },
            None => self.remote_user(access_token).await,
        }
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ProviderError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .client
            .post(url)
            .header("apikey", &self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                return Err(ProviderError::InvalidCredentials)
            }
            status if !status.is_success() => return Err(http_error(response).await),
            _ => {}
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        let session = AuthSession {
            access_token: token.access_token,
            user_id: token.user.id,
            email: token.user.email.unwrap_or_else(|| email.to_string()),
            expires_at: token.expires_at,
        };
        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let _ = self.events.send(AuthEvent::SignedOut {
            access_token: access_token.to_string(),
        });

        // An already-expired token still counts as signed out.
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Ok(()),
            _ => Err(http_error(response).await),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl ProfileStore for RestBackend {
    async fn fetch_profile(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Option<Profile>, ProviderError> {
        let mut url = self.endpoint("rest/v1/profiles")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{user_id}"))
            .append_pair("select", PROFILE_COLUMNS);

        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(http_error(response).await);
        }

        let mut rows: Vec<Profile> = response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))?;

        Ok(rows.pop())
    }
}

async fn http_error(response: reqwest::Response) -> ProviderError {
    let status = response.status().as_u16();
    let message = response.text().await.unwrap_or_default();
    ProviderError::Http { status, message }
}
