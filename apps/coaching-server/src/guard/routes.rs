// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Protected views and the role requirement each one declares.

use crate::auth::{navigation, Role, RoleRequirement};

/// Default system-admin-only path prefixes.
pub const DEFAULT_SECURITY_PATHS: [&str; 4] =
    ["/admin/clinics", "/admin/users", "/admin/system", "/admin/audit"];

/// A view the guard protects.
#[derive(Debug, Clone)]
pub struct ProtectedRoute {
    /// Path prefix the route owns.
    pub path: String,
    /// View rendered on success.
    pub view: String,
    /// Roles the view accepts.
    pub requirement: RoleRequirement,
}

impl ProtectedRoute {
    pub fn new(
        path: impl Into<String>,
        view: impl Into<String>,
        requirement: impl Into<RoleRequirement>,
    ) -> Self {
        Self {
            path: path.into(),
            view: view.into(),
            requirement: requirement.into(),
        }
    }

    fn matches(&self, path: &str) -> bool {
        path_has_prefix(path, &self.path)
    }
}

/// All protected views, matched by longest prefix.
#[derive(Debug, Clone)]
pub struct RouteTable {
    routes: Vec<ProtectedRoute>,
}

impl RouteTable {
    pub fn new(routes: impl IntoIterator<Item = ProtectedRoute>) -> Self {
        let mut routes: Vec<_> = routes.into_iter().collect();
        routes.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        Self { routes }
    }

    /// The application's views.
    pub fn standard() -> Self {
        use Role::*;

        Self::new([
            ProtectedRoute::new(navigation::CLIENT_HOME, "client_home", [Client]),
            ProtectedRoute::new("/client/check-ins", "client_check_ins", [Client]),
            ProtectedRoute::new("/client/progress", "client_progress", [Client]),
            ProtectedRoute::new(navigation::COACH_DASHBOARD, "coach_dashboard", [Coach]),
            ProtectedRoute::new("/coach/clients", "coach_clients", [Coach]),
            ProtectedRoute::new("/coach/check-ins", "coach_check_ins", [Coach]),
            ProtectedRoute::new(navigation::CLINIC_DASHBOARD, "clinic_dashboard", [ClinicAdmin]),
            ProtectedRoute::new("/clinic/coaches", "clinic_coaches", [ClinicAdmin]),
            ProtectedRoute::new("/clinic/clients", "clinic_clients", [ClinicAdmin]),
            ProtectedRoute::new(
                navigation::SYSTEM_DASHBOARD,
                "system_dashboard",
                [SystemAdmin, SystemSuperAdmin],
            ),
            ProtectedRoute::new("/admin/clinics", "admin_clinics", [SystemAdmin, SystemSuperAdmin]),
            ProtectedRoute::new("/admin/users", "admin_users", [SystemAdmin, SystemSuperAdmin]),
            ProtectedRoute::new("/admin/system", "admin_system", [SystemAdmin, SystemSuperAdmin]),
            ProtectedRoute::new("/admin/audit", "admin_audit", [SystemAdmin, SystemSuperAdmin]),
            ProtectedRoute::new("/profile", "profile", RoleRequirement::all_authenticated()),
        ])
    }

    /// Most specific route owning `path`.
    pub fn lookup(&self, path: &str) -> Option<&ProtectedRoute> {
        self.routes.iter().find(|route| route.matches(path))
    }

    pub fn routes(&self) -> &[ProtectedRoute] {
        &self.routes
    }
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// Path prefixes reserved for system admins, checked on every navigation
/// independently of the route's declared requirement.
#[derive(Debug, Clone)]
pub struct SecurityPaths {
    prefixes: Vec<String>,
}

impl SecurityPaths {
    pub fn new(prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            prefixes: prefixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn matches(&self, path: &str) -> bool {
        self.prefixes.iter().any(|prefix| path_has_prefix(path, prefix))
    }

    /// True if `role` reaching `path` is a security violation.
    pub fn forbids(&self, role: Role, path: &str) -> bool {
        !role.is_system_admin() && self.matches(path)
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }
}

impl Default for SecurityPaths {
    fn default() -> Self {
        Self::new(DEFAULT_SECURITY_PATHS)
    }
}

/// Segment-aware prefix match: `/admin/users` owns `/admin/users/42` but
/// not `/admin/usersettings`.
fn path_has_prefix(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.is_empty(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_prefers_most_specific_route() {
        let table = RouteTable::standard();
        assert_eq!(table.lookup("/client").unwrap().view, "client_home");
        assert_eq!(table.lookup("/client/check-ins/7").unwrap().view, "client_check_ins");
        assert_eq!(table.lookup("/admin/users/42").unwrap().view, "admin_users");
    }

    #[test]
    fn lookup_respects_segment_boundaries() {
        let table = RouteTable::standard();
        assert!(table.lookup("/clientele").is_none());
        assert!(table.lookup("/nowhere").is_none());
    }

    #[test]
    fn security_paths_block_lower_roles_only() {
        let paths = SecurityPaths::default();
        assert!(paths.forbids(Role::ClinicAdmin, "/admin/clinics"));
        assert!(paths.forbids(Role::Coach, "/admin/system/settings"));
        assert!(paths.forbids(Role::Client, "/admin/audit"));
        assert!(!paths.forbids(Role::SystemAdmin, "/admin/clinics"));
        assert!(!paths.forbids(Role::SystemSuperAdmin, "/admin/users"));
        assert!(!paths.forbids(Role::Coach, "/coach/dashboard"));
    }

    #[test]
    fn dashboards_are_not_security_paths() {
        let paths = SecurityPaths::default();
        assert!(!paths.matches("/admin/dashboard"));
        assert!(!paths.matches("/clinic/dashboard"));
    }

    #[test]
    fn every_standard_view_is_reachable_by_someone() {
        for route in RouteTable::standard().routes() {
            assert!(route.requirement.roles().next().is_some(), "{}", route.path);
        }
    }
}
