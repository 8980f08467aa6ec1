// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process backend for development and tests.
//!
//! Holds users, passwords, profiles and issued tokens in memory. Latency
//! and outages can be injected to exercise the recovery timeout and the
//! degrade-to-anonymous paths.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

use super::{AuthEvent, AuthProvider, AuthSession, Profile, ProfileStore, ProviderError};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Lifetime of issued access tokens.
const SESSION_TTL_SECS: i64 = 3600;

struct UserRecord {
    user_id: String,
    password: String,
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    profiles: HashMap<String, Profile>,
    sessions: HashMap<String, AuthSession>,
    latency: Option<Duration>,
    unavailable: bool,
}

pub struct InMemoryBackend {
    inner: RwLock<Inner>,
    events: broadcast::Sender<AuthEvent>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBackend {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: RwLock::new(Inner::default()),
            events,
        }
    }

    /// Register a user with a password and (optionally) a profile row.
    pub async fn insert_user(&self, email: &str, password: &str, profile: Option<Profile>) -> String {
        let user_id = profile
            .as_ref()
            .map(|p| p.id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut inner = self.inner.write().await;
        inner.users.insert(
            email.to_lowercase(),
            UserRecord {
                user_id: user_id.clone(),
                password: password.to_string(),
            },
        );
        if let Some(profile) = profile {
            inner.profiles.insert(user_id.clone(), profile);
        }
        user_id
    }

    pub async fn remove_profile(&self, user_id: &str) {
        self.inner.write().await.profiles.remove(user_id);
    }

    /// Delay every call by `latency`.
    pub async fn set_latency(&self, latency: Option<Duration>) {
        self.inner.write().await.latency = latency;
    }

    /// Fail every call with a transport error.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.inner.write().await.unavailable = unavailable;
    }

    /// Rotate a session's token and announce the refresh.
    pub async fn refresh_token(&self, access_token: &str) -> Option<AuthSession> {
        let mut inner = self.inner.write().await;
        let mut session = inner.sessions.remove(access_token)?;
        session.access_token = Uuid::new_v4().to_string();
        session.expires_at = Some(chrono::Utc::now().timestamp() + SESSION_TTL_SECS);
        inner
            .sessions
            .insert(session.access_token.clone(), session.clone());
        drop(inner);

        let _ = self.events.send(AuthEvent::TokenRefreshed {
            previous_token: access_token.to_string(),
            session: session.clone(),
        });
        Some(session)
    }

    async fn simulate_network(&self) -> Result<(), ProviderError> {
        let (latency, unavailable) = {
            let inner = self.inner.read().await;
            (inner.latency, inner.unavailable)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if unavailable {
            return Err(ProviderError::Transport("backend unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl AuthProvider for InMemoryBackend {
    async fn get_current_session(
        &self,
        access_token: &str,
    ) -> Result<Option<AuthSession>, ProviderError> {
        self.simulate_network().await?;
        Ok(self
            .inner
            .read()
            .await
            .sessions
            .get(access_token)
            .filter(|session| !session.is_expired())
            .cloned())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ProviderError> {
        self.simulate_network().await?;

        let mut inner = self.inner.write().await;
        let user_id = match inner.users.get(&email.to_lowercase()) {
            Some(user) if user.password == password => user.user_id.clone(),
            _ => return Err(ProviderError::InvalidCredentials),
        };

        let session = AuthSession {
            access_token: Uuid::new_v4().to_string(),
            user_id,
            email: email.to_string(),
            expires_at: Some(chrono::Utc::now().timestamp() + SESSION_TTL_SECS),
        };
        inner
            .sessions
            .insert(session.access_token.clone(), session.clone());
        drop(inner);

        let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        self.simulate_network().await?;
        self.inner.write().await.sessions.remove(access_token);
        let _ = self.events.send(AuthEvent::SignedOut {
            access_token: access_token.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }
}

#[async_trait]
impl ProfileStore for InMemoryBackend {
    async fn fetch_profile(
        &self,
        user_id: &str,
        _access_token: &str,
    ) -> Result<Option<Profile>, ProviderError> {
        self.simulate_network().await?;
        Ok(self.inner.read().await.profiles.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coach_profile() -> Profile {
        Profile {
            id: "coach_user".to_string(),
            role: Some("coach".to_string()),
            clinic_id: Some("c1".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn sign_in_issues_recoverable_session() {
        let backend = InMemoryBackend::new();
        backend
            .insert_user("coach@clinic.test", "pw", Some(coach_profile()))
            .await;

        let session = backend
            .sign_in_with_password("Coach@Clinic.test", "pw")
            .await
            .unwrap();
        assert_eq!(session.user_id, "coach_user");
        assert!(session.expires_at.is_some());
        assert!(!session.is_expired());

        let recovered = backend
            .get_current_session(&session.access_token)
            .await
            .unwrap();
        assert_eq!(recovered, Some(session));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let backend = InMemoryBackend::new();
        backend.insert_user("a@b.test", "right", None).await;
        let err = backend.sign_in_with_password("a@b.test", "wrong").await;
        assert_eq!(err, Err(ProviderError::InvalidCredentials));
    }

    #[tokio::test]
    async fn sign_out_drops_session_and_notifies() {
        let backend = InMemoryBackend::new();
        backend.insert_user("a@b.test", "pw", None).await;
        let mut events = backend.subscribe();

        let session = backend.sign_in_with_password("a@b.test", "pw").await.unwrap();
        backend.sign_out(&session.access_token).await.unwrap();

        assert!(matches!(events.recv().await, Ok(AuthEvent::SignedIn(_))));
        assert!(matches!(events.recv().await, Ok(AuthEvent::SignedOut { .. })));
        assert_eq!(
            backend.get_current_session(&session.access_token).await,
            Ok(None)
        );
    }

    #[tokio::test]
    async fn unavailable_backend_fails_calls() {
        let backend = InMemoryBackend::new();
        backend.set_unavailable(true).await;
        assert!(matches!(
            backend.fetch_profile("anyone", "token").await,
            Err(ProviderError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn refresh_token_rotates_session() {
        let backend = InMemoryBackend::new();
        backend.insert_user("a@b.test", "pw", None).await;
        let session = backend.sign_in_with_password("a@b.test", "pw").await.unwrap();

        let refreshed = backend.refresh_token(&session.access_token).await.unwrap();
        assert_ne!(refreshed.access_token, session.access_token);
        assert_eq!(
            backend.get_current_session(&session.access_token).await,
            Ok(None)
        );
    }
}
