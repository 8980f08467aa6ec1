// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Hosted Backend Collaborators
//!
//! Authentication and profile data live in the managed backend. This module
//! defines the two seams the access core depends on:
//!
//! - [`AuthProvider`] - session recovery, password sign-in, sign-out and
//!   auth state change notifications
//! - [`ProfileStore`] - the `profiles` table keyed by user id
//!
//! [`RestBackend`] talks to the hosted service over HTTPS.
//! [`InMemoryBackend`] is an in-process stand-in for development and tests.

pub mod jwks;
pub mod memory;
pub mod rest;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use jwks::JwksManager;
pub use memory::InMemoryBackend;
pub use rest::RestBackend;

/// Errors raised by the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("session is invalid or expired")]
    InvalidSession,
    #[error("backend request failed: {0}")]
    Transport(String),
    #[error("backend returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("unexpected backend response: {0}")]
    Decode(String),
}

/// An authenticated session as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub user_id: String,
    pub email: String,
    /// Unix timestamp, if the provider reports one
    #[serde(default)]
    pub expires_at: Option<i64>,
}

impl AuthSession {
    pub fn is_expired(&self) -> bool {
        has_expired(self.expires_at)
    }
}

/// Whether a unix expiry timestamp has passed. `None` never expires.
pub fn has_expired(expires_at: Option<i64>) -> bool {
    expires_at.is_some_and(|exp| chrono::Utc::now().timestamp() >= exp)
}

/// A row of the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Profile {
    pub id: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Raw role tag; validated when the identity is built
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub clinic_id: Option<String>,
    #[serde(default)]
    pub coach_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
}

/// Auth state change notifications (`onAuthStateChange`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    SignedIn(AuthSession),
    TokenRefreshed {
        previous_token: String,
        session: AuthSession,
    },
    SignedOut {
        access_token: String,
    },
}

/// Session side of the hosted backend.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Recover the session behind an access token.
    ///
    /// Returns `Ok(None)` if there is no such session.
    async fn get_current_session(&self, access_token: &str)
        -> Result<Option<AuthSession>, ProviderError>;

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ProviderError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;

    /// Subscribe to auth state changes.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;
}

/// Profile side of the hosted backend.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the profile row for a user. `Ok(None)` if there is no row.
    ///
    /// The request is made as the signed-in user (`access_token`) so
    /// row-level security policies on the table apply.
    async fn fetch_profile(
        &self,
        user_id: &str,
        access_token: &str,
    ) -> Result<Option<Profile>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_deserializes_partial_rows() {
        let profile: Profile =
            serde_json::from_str(r#"{"id":"u1","role":"coach","clinic_id":"c1"}"#).unwrap();
        assert_eq!(profile.id, "u1");
        assert_eq!(profile.role.as_deref(), Some("coach"));
        assert_eq!(profile.full_name, None);
    }

    #[test]
    fn expiry_is_checked_against_the_clock() {
        let now = chrono::Utc::now().timestamp();
        assert!(!has_expired(None));
        assert!(!has_expired(Some(now + 60)));
        assert!(has_expired(Some(now - 1)));

        let session = AuthSession {
            access_token: "tok".to_string(),
            user_id: "u1".to_string(),
            email: "u1@clinic.test".to_string(),
            expires_at: Some(now - 1),
        };
        assert!(session.is_expired());
    }
}
