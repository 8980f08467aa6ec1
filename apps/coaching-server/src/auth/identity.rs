// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authenticated identity and its tenant affiliation.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::roles::Role;
use crate::provider::Profile;

/// Reasons a profile row cannot become an [`Identity`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    #[error("profile has no user id")]
    MissingId,
    #[error("profile {0} has no role")]
    MissingRole(String),
    #[error("profile {user_id} has unknown role '{role}'")]
    UnknownRole { user_id: String, role: String },
}

/// The authenticated principal.
///
/// This is the primary type used throughout the application to represent
/// who is signed in. It is only ever built whole: either every field the
/// resolver depends on is present, or there is no identity at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    /// Canonical user ID (auth provider `sub`)
    pub id: String,
    /// Display name
    pub full_name: String,
    /// Email address, unique per user
    pub email: String,
    /// User's role
    pub role: Role,
    /// Clinic the user belongs to (absent for system admins)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<String>,
    /// Coach or client row backing this identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_record_id: Option<String>,
}

impl Identity {
    /// Build an identity from a profile-store row.
    pub fn from_profile(profile: &Profile) -> Result<Self, IdentityError> {
        if profile.id.trim().is_empty() {
            return Err(IdentityError::MissingId);
        }

        let raw_role = profile
            .role
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| IdentityError::MissingRole(profile.id.clone()))?;

        let role = Role::parse(raw_role).ok_or_else(|| IdentityError::UnknownRole {
            user_id: profile.id.clone(),
            role: raw_role.to_string(),
        })?;

        let linked_record_id = match role {
            Role::Coach => profile.coach_id.clone(),
            Role::Client => profile.client_id.clone(),
            _ => None,
        };

        Ok(Self {
            id: profile.id.clone(),
            full_name: profile.full_name.clone().unwrap_or_default(),
            email: profile.email.clone().unwrap_or_default(),
            role,
            clinic_id: profile.clinic_id.clone(),
            linked_record_id,
        })
    }

    /// Clinic scoping this identity's data access.
    ///
    /// System admins are never tenant-scoped, even if their profile row
    /// happens to carry a clinic id.
    pub fn tenant(&self) -> Option<&str> {
        if self.role.is_tenant_scoped() {
            self.clinic_id.as_deref()
        } else {
            None
        }
    }
}
