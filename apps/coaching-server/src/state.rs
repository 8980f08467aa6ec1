// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::audit::AuditLog;
use crate::auth::{BreakGlass, RoleResolver};
use crate::config::AppConfig;
use crate::guard::{RouteGuard, RouteTable, SecurityPaths};
use crate::provider::{AuthProvider, JwksManager, ProfileStore};
use crate::session::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub guard: Arc<RouteGuard>,
    pub audit: Arc<AuditLog>,
    /// Present when access tokens are verified locally.
    pub jwks: Option<JwksManager>,
}

impl AppState {
    pub fn new(registry: Arc<SessionRegistry>, guard: RouteGuard, audit: Arc<AuditLog>) -> Self {
        Self {
            registry,
            guard: Arc::new(guard),
            audit,
            jwks: None,
        }
    }

    /// Wire the registry and guard from configuration.
    pub fn from_config(
        config: &AppConfig,
        auth: Arc<dyn AuthProvider>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        let audit = Arc::new(AuditLog::default());
        let registry = Arc::new(SessionRegistry::new(
            auth,
            profiles,
            config.recovery_timeout,
            config.session_capacity,
            audit.clone(),
        ));

        let resolver = if config.demo_accounts {
            RoleResolver::with_break_glass(BreakGlass::demo_defaults())
        } else {
            RoleResolver::new()
        };
        let guard = RouteGuard::new(
            resolver,
            RouteTable::standard(),
            SecurityPaths::new(config.security_paths.iter().cloned()),
        );

        Self::new(registry, guard, audit)
    }

    pub fn with_jwks(mut self, jwks: JwksManager) -> Self {
        self.jwks = Some(jwks);
        self
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::provider::{InMemoryBackend, Profile};

    /// State over an in-memory backend seeded with one user per role.
    ///
    /// Every user's password is `pw`; emails are `<role>@clinic.test`.
    pub async fn seeded_state() -> (AppState, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        for (id, role) in [
            ("client_1", "client"),
            ("coach_1", "coach"),
            ("clinic_admin_1", "clinic_admin"),
            ("admin_1", "admin"),
            ("super_admin_1", "super_admin"),
        ] {
            backend
                .insert_user(
                    &format!("{role}@clinic.test"),
                    "pw",
                    Some(Profile {
                        id: id.to_string(),
                        full_name: Some(format!("Test {role}")),
                        role: Some(role.to_string()),
                        clinic_id: (!role.contains("admin") || role == "clinic_admin")
                            .then(|| "clinic_1".to_string()),
                        ..Default::default()
                    }),
                )
                .await;
        }

        let state = AppState::from_config(&AppConfig::default(), backend.clone(), backend.clone());
        (state, backend)
    }

    /// Sign in a seeded user and return the access token.
    pub async fn token_for(state: &AppState, role: &str) -> String {
        let (token, _) = state
            .registry
            .sign_in(&format!("{role}@clinic.test"), "pw")
            .await
            .expect("seeded user signs in");
        token
    }
}
