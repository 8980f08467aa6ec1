// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Session state holder: who is signed in for one browser session.
//!
//! All reads go through [`SessionHolder::state`] and friends, all writes
//! through a single private mutator. Recovery and sign-in are serialized by
//! an async mutex so only one of them can be in flight at a time.
//!
//! Recovery runs against one deadline: the session lookup and the profile
//! lookup together must settle within the recovery timeout.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::SessionError;
use crate::audit::{AuditEvent, AuditEventType, AuditLog};
use crate::auth::{Identity, IdentityError};
use crate::provider::{has_expired, AuthEvent, AuthProvider, AuthSession, ProfileStore};

/// Settled or in-progress session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Recovery has not finished yet.
    Loading,
    /// Nobody is signed in.
    Anonymous,
    /// A fully resolved identity is signed in.
    Authenticated(Identity),
}

impl SessionState {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            SessionState::Authenticated(identity) => Some(identity),
            _ => None,
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, SessionState::Loading)
    }
}

struct Cell {
    state: SessionState,
    access_token: Option<String>,
    /// Unix timestamp after which the session is no longer served
    expires_at: Option<i64>,
}

/// Owns the session state for one browser session.
pub struct SessionHolder {
    auth: Arc<dyn AuthProvider>,
    profiles: Arc<dyn ProfileStore>,
    recovery_timeout: Duration,
    audit: Option<Arc<AuditLog>>,
    cell: RwLock<Cell>,
    in_flight: Mutex<()>,
}

impl SessionHolder {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileStore>,
        recovery_timeout: Duration,
    ) -> Self {
        Self {
            auth,
            profiles,
            recovery_timeout,
            audit: None,
            cell: RwLock::new(Cell {
                state: SessionState::Loading,
                access_token: None,
                expires_at: None,
            }),
            in_flight: Mutex::new(()),
        }
    }

    pub fn with_audit(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn state(&self) -> SessionState {
        self.cell.read().await.state.clone()
    }

    pub async fn current_identity(&self) -> Option<Identity> {
        self.cell.read().await.state.identity().cloned()
    }

    pub async fn access_token(&self) -> Option<String> {
        self.cell.read().await.access_token.clone()
    }

    pub async fn expires_at(&self) -> Option<i64> {
        self.cell.read().await.expires_at
    }

    pub async fn is_authenticated(&self) -> bool {
        matches!(self.cell.read().await.state, SessionState::Authenticated(_))
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Replace the current identity. `None` signs the session out locally.
    pub async fn set_identity(&self, identity: Option<Identity>) {
        match identity {
            Some(identity) => {
                self.cell.write().await.state = SessionState::Authenticated(identity);
            }
            None => self.clear().await,
        }
    }

    /// Recover the session behind `access_token`.
    ///
    /// Never fails: provider errors, a missing or invalid profile, and
    /// running past the recovery timeout all settle as anonymous.
    pub async fn initialize(&self, access_token: Option<&str>) -> SessionState {
        let _in_flight = self.in_flight.lock().await;
        self.recover_locked(access_token).await
    }

    /// Like [`initialize`](Self::initialize), but a no-op once the state
    /// has settled. Concurrent callers share the first caller's recovery.
    ///
    /// A settled session past its expiry is cleared and reported anonymous.
    pub async fn ensure_initialized(&self, access_token: Option<&str>) -> SessionState {
        let _in_flight = self.in_flight.lock().await;
        let (current, expires_at) = {
            let cell = self.cell.read().await;
            (cell.state.clone(), cell.expires_at)
        };
        match current {
            SessionState::Loading => self.recover_locked(access_token).await,
            SessionState::Authenticated(identity) if has_expired(expires_at) => {
                info!(user_id = %identity.id, "Session expired; continuing anonymous");
                self.clear().await;
                SessionState::Anonymous
            }
            settled => settled,
        }
    }

    /// Sign in with email and password.
    ///
    /// If the profile cannot be resolved the provider session is dropped
    /// again and the holder stays anonymous.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, SessionError> {
        let _in_flight = self.in_flight.lock().await;

        let session = match self.auth.sign_in_with_password(email, password).await {
            Ok(session) => session,
            Err(e) => {
                info!(target: "security", error = %e, "Sign-in rejected");
                self.audit(AuditEvent::new(AuditEventType::SignInFailed).with_detail(e.to_string()))
                    .await;
                self.clear().await;
                return Err(e.into());
            }
        };

        let resolved = tokio::time::timeout(self.recovery_timeout, self.resolve(&session))
            .await
            .unwrap_or(Err(SessionError::Timeout));

        match resolved {
            Ok(identity) => {
                info!(user_id = %identity.id, role = %identity.role, "User signed in");
                self.audit(
                    AuditEvent::new(AuditEventType::SignIn)
                        .with_user(&identity.id)
                        .with_role(identity.role),
                )
                .await;
                self.store(SessionState::Authenticated(identity.clone()), &session)
                    .await;
                Ok(identity)
            }
            Err(e) => {
                self.report_resolution_failure(&session.user_id, &e).await;
                if let Err(sign_out_err) = self.auth.sign_out(&session.access_token).await {
                    warn!(error = %sign_out_err, "Failed to drop provider session after profile failure");
                }
                self.clear().await;
                Err(e)
            }
        }
    }

    /// Sign out with the provider and clear local state.
    ///
    /// Provider errors are logged; the local session is cleared regardless.
    pub async fn sign_out(&self) {
        let _in_flight = self.in_flight.lock().await;
        let (token, user_id) = {
            let cell = self.cell.read().await;
            (
                cell.access_token.clone(),
                cell.state.identity().map(|i| i.id.clone()),
            )
        };

        if let Some(token) = token {
            if let Err(e) = self.auth.sign_out(&token).await {
                warn!(error = %e, "Provider sign-out failed; clearing local session anyway");
            }
        }

        if let Some(user_id) = user_id {
            self.audit(AuditEvent::new(AuditEventType::SignOut).with_user(user_id))
                .await;
        }
        self.clear().await;
    }

    /// React to an auth state change concerning this session.
    pub async fn apply_auth_event(&self, event: AuthEvent) -> SessionState {
        match event {
            AuthEvent::SignedIn(session) => {
                let _in_flight = self.in_flight.lock().await;
                let deadline = Instant::now() + self.recovery_timeout;
                self.settle(&session, deadline).await
            }
            AuthEvent::TokenRefreshed { session, .. } => {
                let mut cell = self.cell.write().await;
                if matches!(cell.state, SessionState::Authenticated(_)) {
                    cell.access_token = Some(session.access_token);
                    cell.expires_at = session.expires_at;
                }
                cell.state.clone()
            }
            AuthEvent::SignedOut { .. } => {
                self.clear().await;
                SessionState::Anonymous
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    async fn store(&self, state: SessionState, session: &AuthSession) {
        let mut cell = self.cell.write().await;
        cell.state = state;
        cell.access_token = Some(session.access_token.clone());
        cell.expires_at = session.expires_at;
    }

    async fn clear(&self) {
        let mut cell = self.cell.write().await;
        cell.state = SessionState::Anonymous;
        cell.access_token = None;
        cell.expires_at = None;
    }

    async fn recover_locked(&self, access_token: Option<&str>) -> SessionState {
        let Some(token) = access_token else {
            self.clear().await;
            return SessionState::Anonymous;
        };

        let deadline = Instant::now() + self.recovery_timeout;
        let recovered =
            tokio::time::timeout_at(deadline, self.auth.get_current_session(token)).await;

        let session = match recovered {
            Ok(Ok(Some(session))) => session,
            Ok(Ok(None)) => {
                info!("No session behind access token; continuing anonymous");
                self.clear().await;
                return SessionState::Anonymous;
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Session recovery failed; continuing anonymous");
                self.clear().await;
                return SessionState::Anonymous;
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.recovery_timeout.as_millis() as u64,
                    "Session recovery timed out; continuing anonymous"
                );
                self.clear().await;
                return SessionState::Anonymous;
            }
        };

        let state = self.settle(&session, deadline).await;
        if let SessionState::Authenticated(identity) = &state {
            self.audit(
                AuditEvent::new(AuditEventType::SessionRestored)
                    .with_user(&identity.id)
                    .with_role(identity.role),
            )
            .await;
        }
        state
    }

    /// Resolve the identity for a provider session and store the result.
    ///
    /// The profile lookup shares `deadline` with whatever came before it.
    async fn settle(&self, session: &AuthSession, deadline: Instant) -> SessionState {
        if session.is_expired() {
            info!(user_id = %session.user_id, "Provider session already expired; continuing anonymous");
            self.clear().await;
            return SessionState::Anonymous;
        }

        let resolved = tokio::time::timeout_at(deadline, self.resolve(session))
            .await
            .unwrap_or(Err(SessionError::Timeout));

        match resolved {
            Ok(identity) => {
                let state = SessionState::Authenticated(identity);
                self.store(state.clone(), session).await;
                state
            }
            Err(e) => {
                self.report_resolution_failure(&session.user_id, &e).await;
                self.clear().await;
                SessionState::Anonymous
            }
        }
    }

    async fn resolve(&self, session: &AuthSession) -> Result<Identity, SessionError> {
        let profile = self
            .profiles
            .fetch_profile(&session.user_id, &session.access_token)
            .await?
            .ok_or_else(|| SessionError::ProfileMissing(session.user_id.clone()))?;

        let mut identity = Identity::from_profile(&profile)?;
        if identity.email.is_empty() {
            identity.email = session.email.clone();
        }
        Ok(identity)
    }

    async fn report_resolution_failure(&self, user_id: &str, err: &SessionError) {
        match err {
            SessionError::Identity(IdentityError::UnknownRole { role, .. }) => {
                error!(
                    target: "security",
                    user_id,
                    role = %role,
                    "Profile has unknown role; denying all access"
                );
                self.audit(
                    AuditEvent::new(AuditEventType::UnknownRole)
                        .with_user(user_id)
                        .with_role(role),
                )
                .await;
            }
            _ => warn!(user_id, error = %err, "Could not resolve identity; continuing anonymous"),
        }
    }

    async fn audit(&self, event: AuditEvent) {
        if let Some(audit) = &self.audit {
            audit.record(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::provider::{InMemoryBackend, Profile};

    const RECOVERY_TIMEOUT: Duration = Duration::from_millis(500);

    fn profile(id: &str, role: &str) -> Profile {
        Profile {
            id: id.to_string(),
            full_name: Some("Casey Client".to_string()),
            email: Some(format!("{id}@clinic.test")),
            role: Some(role.to_string()),
            clinic_id: Some("c1".to_string()),
            client_id: Some("client_row".to_string()),
            ..Default::default()
        }
    }

    async fn setup() -> (Arc<InMemoryBackend>, SessionHolder) {
        let backend = Arc::new(InMemoryBackend::new());
        backend
            .insert_user("casey@clinic.test", "pw", Some(profile("casey", "client")))
            .await;
        let holder = SessionHolder::new(backend.clone(), backend.clone(), RECOVERY_TIMEOUT);
        (backend, holder)
    }

    #[tokio::test]
    async fn starts_loading() {
        let (_backend, holder) = setup().await;
        assert_eq!(holder.state().await, SessionState::Loading);
        assert!(!holder.is_authenticated().await);
    }

    #[tokio::test]
    async fn initialize_without_token_is_anonymous() {
        let (_backend, holder) = setup().await;
        assert_eq!(holder.initialize(None).await, SessionState::Anonymous);
    }

    #[tokio::test]
    async fn initialize_restores_signed_in_session() {
        let (backend, holder) = setup().await;
        let session = backend
            .sign_in_with_password("casey@clinic.test", "pw")
            .await
            .unwrap();

        let state = holder.initialize(Some(&session.access_token)).await;
        let identity = state.identity().unwrap();
        assert_eq!(identity.role, Role::Client);
        assert_eq!(identity.linked_record_id.as_deref(), Some("client_row"));
        assert_eq!(holder.access_token().await, Some(session.access_token));
    }

    #[tokio::test]
    async fn initialize_with_unknown_token_is_anonymous() {
        let (_backend, holder) = setup().await;
        assert_eq!(
            holder.initialize(Some("stale-token")).await,
            SessionState::Anonymous
        );
    }

    #[tokio::test]
    async fn backend_outage_degrades_to_anonymous() {
        let (backend, holder) = setup().await;
        backend.set_unavailable(true).await;
        assert_eq!(holder.initialize(Some("any")).await, SessionState::Anonymous);
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_timeout_resolves_to_anonymous() {
        let (backend, holder) = setup().await;
        let session = backend
            .sign_in_with_password("casey@clinic.test", "pw")
            .await
            .unwrap();
        backend.set_latency(Some(Duration::from_secs(60))).await;

        let started = tokio::time::Instant::now();
        let state = holder.initialize(Some(&session.access_token)).await;

        assert_eq!(state, SessionState::Anonymous);
        assert!(started.elapsed() <= RECOVERY_TIMEOUT + Duration::from_millis(50));
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_deadline_spans_session_and_profile_lookups() {
        let (backend, holder) = setup().await;
        let session = backend
            .sign_in_with_password("casey@clinic.test", "pw")
            .await
            .unwrap();
        // Each lookup fits inside the timeout on its own; both together do not.
        backend.set_latency(Some(Duration::from_millis(400))).await;

        let started = tokio::time::Instant::now();
        let state = holder.initialize(Some(&session.access_token)).await;

        assert_eq!(state, SessionState::Anonymous);
        assert!(started.elapsed() <= RECOVERY_TIMEOUT + Duration::from_millis(50));
        assert_eq!(holder.access_token().await, None);
    }

    #[tokio::test]
    async fn expired_session_is_cleared_on_next_use() {
        let (_backend, holder) = setup().await;
        holder.sign_in("casey@clinic.test", "pw").await.unwrap();
        let token = holder.access_token().await;
        assert!(holder.expires_at().await.is_some());
        assert!(holder.ensure_initialized(token.as_deref()).await.identity().is_some());

        holder.cell.write().await.expires_at = Some(chrono::Utc::now().timestamp() - 1);

        assert_eq!(
            holder.ensure_initialized(token.as_deref()).await,
            SessionState::Anonymous
        );
        assert_eq!(holder.access_token().await, None);
        assert_eq!(holder.expires_at().await, None);
    }

    #[tokio::test]
    async fn already_expired_provider_session_is_not_resolved() {
        let (_backend, holder) = setup().await;
        let state = holder
            .apply_auth_event(AuthEvent::SignedIn(AuthSession {
                access_token: "stale".to_string(),
                user_id: "casey".to_string(),
                email: "casey@clinic.test".to_string(),
                expires_at: Some(chrono::Utc::now().timestamp() - 60),
            }))
            .await;
        assert_eq!(state, SessionState::Anonymous);
    }

    #[tokio::test]
    async fn missing_profile_row_degrades_to_anonymous() {
        let (backend, holder) = setup().await;
        let session = backend
            .sign_in_with_password("casey@clinic.test", "pw")
            .await
            .unwrap();
        backend.remove_profile("casey").await;

        assert_eq!(
            holder.initialize(Some(&session.access_token)).await,
            SessionState::Anonymous
        );
        assert_eq!(holder.access_token().await, None);
    }

    #[tokio::test]
    async fn unknown_role_fails_closed_and_is_audited() {
        let backend = Arc::new(InMemoryBackend::new());
        backend
            .insert_user("max@clinic.test", "pw", Some(profile("max", "manager")))
            .await;
        let audit = Arc::new(AuditLog::default());
        let holder = SessionHolder::new(backend.clone(), backend.clone(), RECOVERY_TIMEOUT)
            .with_audit(audit.clone());

        let err = holder.sign_in("max@clinic.test", "pw").await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Identity(IdentityError::UnknownRole { .. })
        ));
        assert_eq!(holder.state().await, SessionState::Anonymous);
        assert_eq!(
            audit.recent(Some(AuditEventType::UnknownRole), None, 10).await.len(),
            1
        );
    }

    #[tokio::test]
    async fn sign_in_then_sign_out() {
        let (backend, holder) = setup().await;
        let identity = holder.sign_in("casey@clinic.test", "pw").await.unwrap();
        assert_eq!(identity.id, "casey");
        assert!(holder.is_authenticated().await);

        let token = holder.access_token().await.unwrap();
        holder.sign_out().await;

        assert_eq!(holder.state().await, SessionState::Anonymous);
        assert_eq!(backend.get_current_session(&token).await, Ok(None));
    }

    #[tokio::test]
    async fn bad_password_leaves_holder_anonymous() {
        let (_backend, holder) = setup().await;
        let err = holder.sign_in("casey@clinic.test", "nope").await.unwrap_err();
        assert!(matches!(err, SessionError::Provider(_)));
        assert_eq!(holder.state().await, SessionState::Anonymous);
    }

    #[tokio::test]
    async fn set_identity_none_clears_session() {
        let (_backend, holder) = setup().await;
        holder.sign_in("casey@clinic.test", "pw").await.unwrap();
        holder.set_identity(None).await;
        assert_eq!(holder.current_identity().await, None);
        assert_eq!(holder.access_token().await, None);
    }

    #[tokio::test]
    async fn concurrent_recoveries_are_serialized() {
        let (backend, holder) = setup().await;
        let session = backend
            .sign_in_with_password("casey@clinic.test", "pw")
            .await
            .unwrap();
        let holder = Arc::new(holder);

        let a = {
            let holder = holder.clone();
            let token = session.access_token.clone();
            tokio::spawn(async move { holder.ensure_initialized(Some(&token)).await })
        };
        let b = {
            let holder = holder.clone();
            let token = session.access_token.clone();
            tokio::spawn(async move { holder.ensure_initialized(Some(&token)).await })
        };

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a, b);
        assert!(holder.is_authenticated().await);
    }

    #[tokio::test]
    async fn token_refresh_keeps_identity() {
        let (backend, holder) = setup().await;
        holder.sign_in("casey@clinic.test", "pw").await.unwrap();
        let token = holder.access_token().await.unwrap();
        let refreshed = backend.refresh_token(&token).await.unwrap();

        let state = holder
            .apply_auth_event(AuthEvent::TokenRefreshed {
                previous_token: token,
                session: refreshed.clone(),
            })
            .await;

        assert!(state.identity().is_some());
        assert_eq!(holder.access_token().await, Some(refreshed.access_token));
        assert_eq!(holder.expires_at().await, refreshed.expires_at);
    }
}
