// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! The authenticated shell every rendered view sits in: a role-specific
//! sidebar and a top bar naming the signed-in user.

use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{navigation, Identity, Role};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct NavItem {
    pub label: &'static str,
    pub path: &'static str,
}

const fn item(label: &'static str, path: &'static str) -> NavItem {
    NavItem { label, path }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct TopBar {
    pub display_name: String,
    pub role: Role,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Shell {
    pub sidebar: Vec<NavItem>,
    pub top_bar: TopBar,
}

impl Shell {
    /// Shell for an identity evaluated as `role`.
    pub fn for_identity(identity: &Identity, role: Role) -> Self {
        let display_name = if identity.full_name.is_empty() {
            identity.email.clone()
        } else {
            identity.full_name.clone()
        };

        Self {
            sidebar: sidebar_for(role),
            top_bar: TopBar {
                display_name,
                role,
                clinic_id: identity.tenant().map(str::to_string),
            },
        }
    }
}

/// Sidebar entries a role may follow. Every entry is a view the guard
/// renders for that role.
pub fn sidebar_for(role: Role) -> Vec<NavItem> {
    let mut items = match role {
        Role::Client => vec![
            item("Home", navigation::CLIENT_HOME),
            item("Check-ins", "/client/check-ins"),
            item("Progress", "/client/progress"),
        ],
        Role::Coach => vec![
            item("Dashboard", navigation::COACH_DASHBOARD),
            item("Clients", "/coach/clients"),
            item("Check-ins", "/coach/check-ins"),
        ],
        Role::ClinicAdmin => vec![
            item("Dashboard", navigation::CLINIC_DASHBOARD),
            item("Coaches", "/clinic/coaches"),
            item("Clients", "/clinic/clients"),
        ],
        Role::SystemAdmin | Role::SystemSuperAdmin => vec![
            item("Dashboard", navigation::SYSTEM_DASHBOARD),
            item("Clinics", "/admin/clinics"),
            item("Users", "/admin/users"),
            item("System", "/admin/system"),
            item("Audit log", "/admin/audit"),
        ],
    };
    items.push(item("Profile", "/profile"));
    items
}
