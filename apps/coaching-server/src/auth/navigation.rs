// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role landing pages and other fixed navigation targets.

use serde::Serialize;
use utoipa::ToSchema;

use super::roles::Role;

pub const CLIENT_HOME: &str = "/client";
pub const COACH_DASHBOARD: &str = "/coach/dashboard";
pub const CLINIC_DASHBOARD: &str = "/clinic/dashboard";
pub const SYSTEM_DASHBOARD: &str = "/admin/dashboard";
pub const UNAUTHORIZED: &str = "/unauthorized";
pub const LOGIN: &str = "/login";

/// Default landing page for a role.
///
/// Clinic admins and system admins land on different dashboards; a clinic
/// admin is never sent to the platform dashboard.
pub fn landing_for(role: Option<Role>) -> &'static str {
    match role {
        Some(Role::Client) => CLIENT_HOME,
        Some(Role::Coach) => COACH_DASHBOARD,
        Some(Role::ClinicAdmin) => CLINIC_DASHBOARD,
        Some(Role::SystemAdmin | Role::SystemSuperAdmin) => SYSTEM_DASHBOARD,
        None => UNAUTHORIZED,
    }
}

/// Navigation targets exposed to the frontend.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NavigationTargets {
    pub client: &'static str,
    pub coach: &'static str,
    pub clinic_admin: &'static str,
    pub system_admin: &'static str,
    pub unauthorized: &'static str,
    pub login: &'static str,
}

impl NavigationTargets {
    pub const fn get() -> Self {
        Self {
            client: CLIENT_HOME,
            coach: COACH_DASHBOARD,
            clinic_admin: CLINIC_DASHBOARD,
            system_admin: SYSTEM_DASHBOARD,
            unauthorized: UNAUTHORIZED,
            login: LOGIN,
        }
    }
}
