// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role resolution: does an identity satisfy a role requirement?
//!
//! ## Evaluation Order
//!
//! First matching rule wins. The order is part of the contract:
//!
//! 1. No identity → deny
//! 2. Demo client email → evaluated as a plain client
//! 3. Demo admin email → grant
//! 4. System admin / super admin → grant
//! 5. Clinic admin → deny a system-admin requirement that does not also
//!    name clinic admins, otherwise grant iff clinic admins are named
//! 6. Coach → deny if system or clinic admins are named, otherwise grant
//!    iff coaches are named
//! 7. Client → deny if any staff role is named, otherwise grant iff
//!    clients are named
//!
//! Plain set membership is not enough: a requirement such as
//! `[clinic_admin, coach]` must never let a coach through, and a clinic admin
//! must never satisfy a system-admin-only view.

use serde::Serialize;
use utoipa::ToSchema;

use super::break_glass::{BreakGlass, BreakGlassKind};
use super::identity::Identity;
use super::navigation::{landing_for, LOGIN};
use super::requirement::RoleRequirement;
use super::roles::Role;

/// Why access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// Nobody is signed in.
    Anonymous,
    /// The identity's role does not satisfy the requirement.
    InsufficientRole,
    /// A lower-privilege role reached a reserved system path.
    SecurityPath,
    /// The requested path is not a known view.
    UnknownRoute,
}

/// Outcome of evaluating an identity against a requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    /// Always carries somewhere to go.
    Denied {
        redirect: &'static str,
        reason: DenialReason,
    },
}

impl AccessDecision {
    pub fn is_granted(&self) -> bool {
        matches!(self, AccessDecision::Granted)
    }

    /// Deny and send the identity to its own landing page.
    pub fn deny_for(identity: Option<&Identity>, reason: DenialReason) -> Self {
        let redirect = match (identity, reason) {
            (None, _) | (_, DenialReason::Anonymous) => LOGIN,
            (Some(identity), _) => landing_for(Some(identity.role)),
        };
        AccessDecision::Denied { redirect, reason }
    }
}

/// Decides grant/deny for identities. Holds no mutable state.
#[derive(Debug, Clone, Default)]
pub struct RoleResolver {
    break_glass: Option<BreakGlass>,
}

impl RoleResolver {
    /// Resolver without any demo overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolver that honours the given break-glass identities.
    pub fn with_break_glass(break_glass: BreakGlass) -> Self {
        Self {
            break_glass: Some(break_glass),
        }
    }

    pub fn break_glass_enabled(&self) -> bool {
        self.break_glass.as_ref().is_some_and(|bg| !bg.is_empty())
    }

    /// Returns true if `identity` may access a view declaring `required`.
    pub fn has_access(&self, identity: Option<&Identity>, required: &RoleRequirement) -> bool {
        let Some(identity) = identity else {
            return false;
        };

        match self.break_glass_kind(identity) {
            Some(BreakGlassKind::DemoClient) => return role_allows(Role::Client, required),
            Some(BreakGlassKind::DemoAdmin) => return true,
            None => {}
        }

        role_allows(identity.role, required)
    }

    /// Like [`has_access`](Self::has_access), with a redirect on deny.
    pub fn decide(&self, identity: Option<&Identity>, required: &RoleRequirement) -> AccessDecision {
        if identity.is_none() {
            return AccessDecision::deny_for(None, DenialReason::Anonymous);
        }
        if self.has_access(identity, required) {
            AccessDecision::Granted
        } else {
            AccessDecision::deny_for(identity, DenialReason::InsufficientRole)
        }
    }

    /// Role the identity is evaluated as, after demo overrides.
    pub fn effective_role(&self, identity: &Identity) -> Role {
        match self.break_glass_kind(identity) {
            Some(BreakGlassKind::DemoClient) => Role::Client,
            Some(BreakGlassKind::DemoAdmin) => Role::SystemAdmin,
            None => identity.role,
        }
    }

    fn break_glass_kind(&self, identity: &Identity) -> Option<BreakGlassKind> {
        self.break_glass.as_ref()?.classify(&identity.email)
    }
}

/// Rules 4-7 for a concrete role.
fn role_allows(role: Role, required: &RoleRequirement) -> bool {
    match role {
        Role::SystemAdmin | Role::SystemSuperAdmin => true,
        Role::ClinicAdmin => {
            if required.includes_system_admin() && !required.contains(Role::ClinicAdmin) {
                return false;
            }
            required.contains(Role::ClinicAdmin)
        }
        Role::Coach => {
            if required.includes_system_admin() || required.contains(Role::ClinicAdmin) {
                return false;
            }
            required.contains(Role::Coach)
        }
        Role::Client => {
            if required.includes_system_admin()
                || required.contains(Role::ClinicAdmin)
                || required.contains(Role::Coach)
            {
                return false;
            }
            required.contains(Role::Client)
        }
    }
}
