// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User roles for authorization.
///
/// ## Role Hierarchy
///
/// - `SystemAdmin` / `SystemSuperAdmin` - Platform operators, full access
/// - `ClinicAdmin` - Manages one clinic (tenant) and its coaches
/// - `Coach` - Works with the clients assigned to them
/// - `Client` - Submits check-ins, sees only their own data
///
/// The set is closed. Anything the profile store returns outside of it is
/// rejected when the identity is built, so no code path ever sees an
/// "unknown" role value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Platform administrator (stored as `admin`)
    #[serde(rename = "admin")]
    SystemAdmin,
    /// Platform super administrator (stored as `super_admin`)
    #[serde(rename = "super_admin")]
    SystemSuperAdmin,
    /// Administrator of a single clinic
    ClinicAdmin,
    /// Coach affiliated with a clinic
    Coach,
    /// Client coached within a clinic
    Client,
}

impl Role {
    /// Every known role, most privileged first.
    pub const ALL: [Role; 5] = [
        Role::SystemAdmin,
        Role::SystemSuperAdmin,
        Role::ClinicAdmin,
        Role::Coach,
        Role::Client,
    ];

    /// Parse role from string (case-insensitive).
    ///
    /// Accepts the tags stored in the profile table plus the long
    /// `system_*` spellings.
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "admin" | "system_admin" => Some(Role::SystemAdmin),
            "super_admin" | "system_super_admin" => Some(Role::SystemSuperAdmin),
            "clinic_admin" => Some(Role::ClinicAdmin),
            "coach" => Some(Role::Coach),
            "client" => Some(Role::Client),
            _ => None,
        }
    }

    /// Tag used in the profile store and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SystemAdmin => "admin",
            Role::SystemSuperAdmin => "super_admin",
            Role::ClinicAdmin => "clinic_admin",
            Role::Coach => "coach",
            Role::Client => "client",
        }
    }

    /// True for the two platform-wide roles.
    pub fn is_system_admin(&self) -> bool {
        matches!(self, Role::SystemAdmin | Role::SystemSuperAdmin)
    }

    /// True for roles whose data access is scoped to a single clinic.
    pub fn is_tenant_scoped(&self) -> bool {
        !self.is_system_admin()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
