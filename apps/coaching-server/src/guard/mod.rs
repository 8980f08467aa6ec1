// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Route Guard
//!
//! Decides, for every navigation, whether the requested view renders or the
//! user is redirected.
//!
//! ## States
//!
//! | Session | Outcome |
//! |---------|---------|
//! | still recovering | `Loading` (neutral placeholder) |
//! | nobody signed in | redirect to `/login` |
//! | resolver grants, not a reserved path | render view inside the shell |
//! | otherwise | notice + redirect to the role's landing page |
//!
//! Reserved system paths ([`SecurityPaths`]) are checked on every
//! navigation on top of the route's own requirement. Either check alone is
//! enough to deny.

pub mod middleware;
pub mod routes;
pub mod shell;

pub use routes::{ProtectedRoute, RouteTable, SecurityPaths};
pub use shell::{NavItem, Shell};

use serde::Serialize;
use tracing::{error, info};
use utoipa::ToSchema;

use crate::auth::{navigation, AccessDecision, DenialReason, Identity, Role, RoleResolver};
use crate::session::SessionState;

/// User-visible notice attached to every denial.
pub const ACCESS_DENIED_NOTICE: &str = "You do not have permission to view that page.";

/// Guard state for one navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum GuardState {
    Loading,
    Anonymous,
    Authorized,
    Unauthorized,
}

/// What the guard wants done with a navigation.
#[derive(Debug, Clone, PartialEq)]
pub enum GuardOutcome {
    /// Session not settled yet; show a neutral placeholder.
    Loading,
    /// Nobody is signed in.
    RedirectToLogin,
    /// Render the view inside the authenticated shell.
    Render {
        view: String,
        identity: Identity,
        shell: Box<Shell>,
    },
    /// Show a notice and go to `redirect`.
    Deny {
        redirect: &'static str,
        reason: DenialReason,
        notice: &'static str,
        /// Set when an identity was signed in.
        user: Option<(String, Role)>,
    },
}

impl GuardOutcome {
    pub fn state(&self) -> GuardState {
        match self {
            GuardOutcome::Loading => GuardState::Loading,
            GuardOutcome::RedirectToLogin => GuardState::Anonymous,
            GuardOutcome::Render { .. } => GuardState::Authorized,
            GuardOutcome::Deny { .. } => GuardState::Unauthorized,
        }
    }

    /// Where the browser should go, if anywhere.
    pub fn redirect(&self) -> Option<&'static str> {
        match self {
            GuardOutcome::RedirectToLogin => Some(navigation::LOGIN),
            GuardOutcome::Deny { redirect, .. } => Some(*redirect),
            _ => None,
        }
    }
}

/// Gatekeeper for protected views. Evaluation is synchronous and pure apart
/// from logging.
#[derive(Debug, Clone, Default)]
pub struct RouteGuard {
    resolver: RoleResolver,
    routes: RouteTable,
    security: SecurityPaths,
}

impl RouteGuard {
    pub fn new(resolver: RoleResolver, routes: RouteTable, security: SecurityPaths) -> Self {
        Self {
            resolver,
            routes,
            security,
        }
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Evaluate a navigation to `path` for the given session state.
    pub fn evaluate(&self, session: &SessionState, path: &str) -> GuardOutcome {
        let identity = match session {
            SessionState::Loading => return GuardOutcome::Loading,
            SessionState::Anonymous => return GuardOutcome::RedirectToLogin,
            SessionState::Authenticated(identity) => identity,
        };
        let role = self.resolver.effective_role(identity);

        if self.security.forbids(role, path) {
            error!(
                target: "security",
                user_id = %identity.id,
                role = %role,
                path,
                "Security violation: reserved system path requested by lower-privilege role"
            );
            return deny(identity, role, DenialReason::SecurityPath);
        }

        let Some(route) = self.routes.lookup(path) else {
            info!(target: "security", user_id = %identity.id, path, "Navigation to unknown view denied");
            return deny(identity, role, DenialReason::UnknownRoute);
        };

        match self.resolver.decide(Some(identity), &route.requirement) {
            AccessDecision::Granted => GuardOutcome::Render {
                view: route.view.clone(),
                identity: identity.clone(),
                shell: Box::new(Shell::for_identity(identity, role)),
            },
            AccessDecision::Denied { reason, .. } => {
                info!(
                    target: "security",
                    user_id = %identity.id,
                    role = %role,
                    path,
                    view = %route.view,
                    "Access denied"
                );
                deny(identity, role, reason)
            }
        }
    }
}

/// Denials land on the page of the role the identity was evaluated as.
fn deny(identity: &Identity, role: Role, reason: DenialReason) -> GuardOutcome {
    GuardOutcome::Deny {
        redirect: navigation::landing_for(Some(role)),
        reason,
        notice: ACCESS_DENIED_NOTICE,
        user: Some((identity.id.clone(), identity.role)),
    }
}
