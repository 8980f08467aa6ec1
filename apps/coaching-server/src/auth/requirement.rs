// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role requirements declared by protected views.

use std::collections::BTreeSet;

use serde::Serialize;

use super::roles::Role;

/// The set of roles a protected view accepts. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RoleRequirement {
    roles: BTreeSet<Role>,
}

impl RoleRequirement {
    /// Build a requirement from a list of roles.
    ///
    /// An empty list means the view is open to every authenticated user.
    pub fn new(roles: impl IntoIterator<Item = Role>) -> Self {
        let roles: BTreeSet<Role> = roles.into_iter().collect();
        if roles.is_empty() {
            return Self::all_authenticated();
        }
        Self { roles }
    }

    /// Any signed-in user, whatever their role.
    pub fn all_authenticated() -> Self {
        Self {
            roles: Role::ALL.into_iter().collect(),
        }
    }

    /// Platform administrators only.
    pub fn system_only() -> Self {
        Self::new([Role::SystemAdmin, Role::SystemSuperAdmin])
    }

    /// Build a requirement from role tags, e.g. from configuration.
    ///
    /// Unknown tags are dropped. If none of the tags are known the result
    /// is system-admin-only rather than "everyone".
    pub fn parse<'a>(tags: impl IntoIterator<Item = &'a str>) -> Self {
        let mut roles = BTreeSet::new();
        let mut saw_any = false;
        for tag in tags {
            saw_any = true;
            match Role::parse(tag) {
                Some(role) => {
                    roles.insert(role);
                }
                None => tracing::warn!(tag, "Ignoring unknown role in requirement"),
            }
        }

        if roles.is_empty() && saw_any {
            return Self::system_only();
        }
        Self::new(roles)
    }

    pub fn contains(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// True if either system role is accepted.
    pub fn includes_system_admin(&self) -> bool {
        self.contains(Role::SystemAdmin) || self.contains(Role::SystemSuperAdmin)
    }

    /// True if nothing below the system roles is accepted.
    pub fn is_system_only(&self) -> bool {
        self.roles.iter().all(Role::is_system_admin)
    }

    pub fn roles(&self) -> impl Iterator<Item = Role> + '_ {
        self.roles.iter().copied()
    }
}

impl<const N: usize> From<[Role; N]> for RoleRequirement {
    fn from(roles: [Role; N]) -> Self {
        Self::new(roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_requirement_means_all_authenticated() {
        let requirement = RoleRequirement::new([]);
        assert_eq!(requirement, RoleRequirement::all_authenticated());
        for role in Role::ALL {
            assert!(requirement.contains(role));
        }
    }

    #[test]
    fn parse_maps_known_tags() {
        let requirement = RoleRequirement::parse(["admin", "clinic_admin"]);
        assert!(requirement.contains(Role::SystemAdmin));
        assert!(requirement.contains(Role::ClinicAdmin));
        assert!(!requirement.contains(Role::Coach));
    }

    #[test]
    fn parse_with_only_unknown_tags_fails_closed() {
        let requirement = RoleRequirement::parse(["manager", "owner"]);
        assert!(requirement.is_system_only());
        assert!(!requirement.contains(Role::Client));
    }

    #[test]
    fn parse_of_nothing_is_all_authenticated() {
        let requirement = RoleRequirement::parse(std::iter::empty());
        assert_eq!(requirement, RoleRequirement::all_authenticated());
    }

    #[test]
    fn system_only_detection() {
        assert!(RoleRequirement::from([Role::SystemAdmin]).is_system_only());
        assert!(RoleRequirement::system_only().includes_system_admin());
        assert!(!RoleRequirement::from([Role::SystemAdmin, Role::ClinicAdmin]).is_system_only());
    }
}
