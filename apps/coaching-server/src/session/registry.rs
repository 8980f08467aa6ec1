// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! LRU-bounded registry of live sessions, keyed by access token.
//!
//! Each browser session owns exactly one [`SessionHolder`]. Holders are
//! inserted on sign-in, restored lazily on the first request that presents
//! an unknown token, and dropped on sign-out. Evicted sessions are simply
//! restored again on their next request.
//!
//! Signed-out tokens are remembered until their expiry. A token that still
//! verifies locally (JWKS mode) must not come back after logout.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use lru::LruCache;
use tracing::{debug, warn};

use super::{SessionError, SessionHolder, SessionState};
use crate::audit::AuditLog;
use crate::auth::Identity;
use crate::provider::{has_expired, AuthEvent, AuthProvider, ProfileStore, ProviderError};

/// Default number of sessions kept in memory.
pub const DEFAULT_SESSION_CAPACITY: usize = 1024;

/// Signed-out tokens remembered per live session slot.
const REVOKED_PER_SESSION: usize = 4;

pub struct SessionRegistry {
    auth: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileStore>,
    recovery_timeout: Duration,
    audit: Arc<AuditLog>,
    sessions: Mutex<LruCache<String, Arc<SessionHolder>>>,
    /// Signed-out token -> its expiry, if known
    revoked: Mutex<LruCache<String, Option<i64>>>,
}

impl SessionRegistry {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileStore>,
        recovery_timeout: Duration,
        capacity: usize,
        audit: Arc<AuditLog>,
    ) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let revoked_capacity =
            NonZeroUsize::new(capacity.get().saturating_mul(REVOKED_PER_SESSION))
                .unwrap_or(capacity);
        Self {
            auth,
            profiles,
            recovery_timeout,
            audit,
            sessions: Mutex::new(LruCache::new(capacity)),
            revoked: Mutex::new(LruCache::new(revoked_capacity)),
        }
    }

    pub fn auth_provider(&self) -> Arc<dyn AuthProvider> {
        self.auth.clone()
    }

    pub fn recovery_timeout(&self) -> Duration {
        self.recovery_timeout
    }

    fn new_holder(&self) -> SessionHolder {
        SessionHolder::new(self.auth.clone(), self.profiles.clone(), self.recovery_timeout)
            .with_audit(self.audit.clone())
    }

    /// Holder for a token, if one is live.
    pub fn get(&self, access_token: &str) -> Option<Arc<SessionHolder>> {
        self.sessions.lock().ok()?.get(access_token).cloned()
    }

    fn insert(&self, access_token: String, holder: Arc<SessionHolder>) {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.put(access_token, holder);
        }
    }

    fn remove(&self, access_token: &str) -> Option<Arc<SessionHolder>> {
        self.sessions.lock().ok()?.pop(access_token)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn revoke(&self, access_token: &str, expires_at: Option<i64>) {
        if let Ok(mut revoked) = self.revoked.lock() {
            let expires_at = expires_at.or_else(|| revoked.peek(access_token).copied().flatten());
            revoked.put(access_token.to_string(), expires_at);
        }
    }

    /// Whether the token was signed out. A poisoned lock counts as revoked.
    pub fn is_revoked(&self, access_token: &str) -> bool {
        let Ok(mut revoked) = self.revoked.lock() else {
            return true;
        };
        match revoked.get(access_token).copied() {
            None => false,
            Some(expires_at) => {
                // Past expiry the provider rejects the token on its own.
                if has_expired(expires_at) {
                    revoked.pop(access_token);
                }
                true
            }
        }
    }

    /// Session state for a request.
    ///
    /// Unknown tokens are recovered from the provider; anonymous results are
    /// not cached so a bad token cannot occupy a slot. Signed-out and
    /// expired tokens are anonymous.
    pub async fn restore(&self, access_token: &str) -> SessionState {
        if self.is_revoked(access_token) {
            debug!("Rejecting signed-out access token");
            return SessionState::Anonymous;
        }
        let Some(holder) = self.get_or_create(access_token) else {
            return SessionState::Anonymous;
        };

        let state = holder.ensure_initialized(Some(access_token)).await;
        // A sign-out may have landed while recovery was in flight.
        if self.is_revoked(access_token) {
            self.remove(access_token);
            return SessionState::Anonymous;
        }
        if !matches!(state, SessionState::Authenticated(_)) {
            self.remove(access_token);
        }
        state
    }

    fn get_or_create(&self, access_token: &str) -> Option<Arc<SessionHolder>> {
        let mut sessions = self.sessions.lock().ok()?;
        let holder = sessions.get_or_insert(access_token.to_string(), || Arc::new(self.new_holder()));
        Some(holder.clone())
    }

    /// Sign in and register the new session.
    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
    ) -> Result<(String, Identity), SessionError> {
        let holder = Arc::new(self.new_holder());
        let identity = holder.sign_in(email, password).await?;
        let token = holder
            .access_token()
            .await
            .ok_or(SessionError::Provider(ProviderError::InvalidSession))?;
        self.insert(token.clone(), holder);
        Ok((token, identity))
    }

    /// Sign the session out everywhere.
    ///
    /// The token is revoked before the provider is told, so it stops
    /// working here even if the provider call fails.
    pub async fn sign_out(&self, access_token: &str) {
        let holder = self.remove(access_token);
        let expires_at = match &holder {
            Some(holder) => holder.expires_at().await,
            None => None,
        };
        self.revoke(access_token, expires_at);

        match holder {
            Some(holder) => holder.sign_out().await,
            None => {
                if let Err(e) = self.auth.sign_out(access_token).await {
                    warn!(error = %e, "Provider sign-out failed for unregistered session");
                }
            }
        }
    }

    /// Apply a provider auth state change.
    pub async fn apply_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) => {
                // Registered by `sign_in`, or restored lazily on first use.
                debug!(user_id = %session.user_id, "Sign-in announced");
            }
            AuthEvent::TokenRefreshed {
                previous_token,
                session,
            } => {
                if let Some(holder) = self.remove(&previous_token) {
                    let token = session.access_token.clone();
                    holder
                        .apply_auth_event(AuthEvent::TokenRefreshed {
                            previous_token,
                            session,
                        })
                        .await;
                    self.insert(token, holder);
                }
            }
            AuthEvent::SignedOut { access_token } => {
                let holder = self.remove(&access_token);
                let expires_at = match &holder {
                    Some(holder) => holder.expires_at().await,
                    None => None,
                };
                self.revoke(&access_token, expires_at);
                if let Some(holder) = holder {
                    holder
                        .apply_auth_event(AuthEvent::SignedOut { access_token })
                        .await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::broadcast;

    use crate::provider::{AuthSession, InMemoryBackend, Profile};

    /// Accepts every `jwt-` token it is shown, even after sign-out, the way
    /// local JWKS verification does. `jwt-expired` tokens carry a past expiry.
    struct LocallyVerifiedTokens {
        profile_fetches: AtomicUsize,
        events: broadcast::Sender<AuthEvent>,
    }

    impl LocallyVerifiedTokens {
        fn new() -> Self {
            let (events, _) = broadcast::channel(16);
            Self {
                profile_fetches: AtomicUsize::new(0),
                events,
            }
        }

        fn session(access_token: &str) -> AuthSession {
            let now = chrono::Utc::now().timestamp();
            let expires_at = if access_token.starts_with("jwt-expired") {
                now - 60
            } else {
                now + 3600
            };
            AuthSession {
                access_token: access_token.to_string(),
                user_id: "coach_1".to_string(),
                email: "coach@clinic.test".to_string(),
                expires_at: Some(expires_at),
            }
        }
    }

    #[async_trait]
    impl AuthProvider for LocallyVerifiedTokens {
        async fn get_current_session(
            &self,
            access_token: &str,
        ) -> Result<Option<AuthSession>, ProviderError> {
            Ok(access_token
                .starts_with("jwt-")
                .then(|| Self::session(access_token)))
        }

        async fn sign_in_with_password(
            &self,
            _email: &str,
            _password: &str,
        ) -> Result<AuthSession, ProviderError> {
            let session = Self::session("jwt-signed-in");
            let _ = self.events.send(AuthEvent::SignedIn(session.clone()));
            Ok(session)
        }

        async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
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
    impl ProfileStore for LocallyVerifiedTokens {
        async fn fetch_profile(
            &self,
            user_id: &str,
            _access_token: &str,
        ) -> Result<Option<Profile>, ProviderError> {
            self.profile_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(Some(Profile {
                id: user_id.to_string(),
                role: Some("coach".to_string()),
                clinic_id: Some("c1".to_string()),
                ..Default::default()
            }))
        }
    }

    fn locally_verified() -> (Arc<LocallyVerifiedTokens>, SessionRegistry) {
        let provider = Arc::new(LocallyVerifiedTokens::new());
        let registry = SessionRegistry::new(
            provider.clone(),
            provider.clone(),
            Duration::from_secs(1),
            8,
            Arc::new(AuditLog::default()),
        );
        (provider, registry)
    }

    async fn setup(capacity: usize) -> (Arc<InMemoryBackend>, SessionRegistry) {
        let backend = Arc::new(InMemoryBackend::new());
        backend
            .insert_user(
                "coach@clinic.test",
                "pw",
                Some(Profile {
                    id: "coach_1".to_string(),
                    role: Some("coach".to_string()),
                    clinic_id: Some("c1".to_string()),
                    ..Default::default()
                }),
            )
            .await;
        let registry = SessionRegistry::new(
            backend.clone(),
            backend.clone(),
            Duration::from_secs(1),
            capacity,
            Arc::new(AuditLog::default()),
        );
        (backend, registry)
    }

    #[tokio::test]
    async fn sign_in_registers_session() {
        let (_backend, registry) = setup(8).await;
        let (token, identity) = registry.sign_in("coach@clinic.test", "pw").await.unwrap();
        assert_eq!(identity.id, "coach_1");
        assert!(registry.get(&token).is_some());
    }

    #[tokio::test]
    async fn restore_recovers_unknown_token_once() {
        let (backend, registry) = setup(8).await;
        let session = backend
            .sign_in_with_password("coach@clinic.test", "pw")
            .await
            .unwrap();

        let state = registry.restore(&session.access_token).await;
        assert!(state.identity().is_some());
        assert_eq!(registry.len(), 1);

        // Second restore reuses the settled holder even if the backend is gone.
        backend.set_unavailable(true).await;
        let again = registry.restore(&session.access_token).await;
        assert_eq!(again, state);
    }

    #[tokio::test]
    async fn anonymous_restores_are_not_cached() {
        let (_backend, registry) = setup(8).await;
        let state = registry.restore("bogus").await;
        assert_eq!(state, SessionState::Anonymous);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn sign_out_removes_session() {
        let (backend, registry) = setup(8).await;
        let (token, _) = registry.sign_in("coach@clinic.test", "pw").await.unwrap();
        registry.sign_out(&token).await;
        assert!(registry.get(&token).is_none());
        assert_eq!(backend.get_current_session(&token).await, Ok(None));
    }

    #[tokio::test]
    async fn capacity_evicts_least_recent() {
        let (_backend, registry) = setup(1).await;
        let (first, _) = registry.sign_in("coach@clinic.test", "pw").await.unwrap();
        let (second, _) = registry.sign_in("coach@clinic.test", "pw").await.unwrap();
        assert!(registry.get(&first).is_none());
        assert!(registry.get(&second).is_some());
    }

    #[tokio::test]
    async fn signed_out_event_drops_holder() {
        let (_backend, registry) = setup(8).await;
        let (token, _) = registry.sign_in("coach@clinic.test", "pw").await.unwrap();
        let holder = registry.get(&token).unwrap();

        registry
            .apply_event(AuthEvent::SignedOut {
                access_token: token.clone(),
            })
            .await;

        assert!(registry.get(&token).is_none());
        assert_eq!(holder.state().await, SessionState::Anonymous);
    }

    #[tokio::test]
    async fn refreshed_event_rekeys_holder() {
        let (backend, registry) = setup(8).await;
        let (token, _) = registry.sign_in("coach@clinic.test", "pw").await.unwrap();
        let refreshed = backend.refresh_token(&token).await.unwrap();

        registry
            .apply_event(AuthEvent::TokenRefreshed {
                previous_token: token.clone(),
                session: refreshed.clone(),
            })
            .await;

        assert!(registry.get(&token).is_none());
        let holder = registry.get(&refreshed.access_token).unwrap();
        assert!(holder.is_authenticated().await);
    }

    #[tokio::test]
    async fn signed_out_token_stays_signed_out() {
        let (_provider, registry) = locally_verified();
        assert!(registry.restore("jwt-abc").await.identity().is_some());

        registry.sign_out("jwt-abc").await;

        assert!(registry.is_revoked("jwt-abc"));
        assert_eq!(registry.restore("jwt-abc").await, SessionState::Anonymous);
        assert!(registry.get("jwt-abc").is_none());
        assert!(registry.restore("jwt-other").await.identity().is_some());
    }

    #[tokio::test]
    async fn provider_sign_out_event_revokes_token() {
        let (_provider, registry) = locally_verified();
        assert!(registry.restore("jwt-abc").await.identity().is_some());

        registry
            .apply_event(AuthEvent::SignedOut {
                access_token: "jwt-abc".to_string(),
            })
            .await;

        assert_eq!(registry.restore("jwt-abc").await, SessionState::Anonymous);
    }

    #[tokio::test]
    async fn expired_token_is_not_restored() {
        let (_provider, registry) = locally_verified();
        assert_eq!(registry.restore("jwt-expired").await, SessionState::Anonymous);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn sign_in_announcement_does_not_resolve_again() {
        let (provider, registry) = locally_verified();
        let mut events = provider.subscribe();

        let (token, _) = registry.sign_in("coach@clinic.test", "pw").await.unwrap();
        let holder = registry.get(&token).unwrap();
        let announced = events.recv().await.unwrap();
        assert!(matches!(announced, AuthEvent::SignedIn(_)));
        registry.apply_event(announced).await;

        assert_eq!(provider.profile_fetches.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&holder, &registry.get(&token).unwrap()));
    }

    #[tokio::test]
    async fn announced_sign_in_is_restored_on_first_use() {
        let (backend, registry) = setup(8).await;
        let session = backend
            .sign_in_with_password("coach@clinic.test", "pw")
            .await
            .unwrap();

        registry.apply_event(AuthEvent::SignedIn(session.clone())).await;
        assert!(registry.is_empty());

        let state = registry.restore(&session.access_token).await;
        assert_eq!(state.identity().map(|i| i.id.as_str()), Some("coach_1"));
    }
}
