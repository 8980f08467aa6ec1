// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authorization Module
//!
//! Who the signed-in user is and what they may see.
//!
//! ## Roles
//!
//! Five roles in three tiers: platform staff (`admin`, `super_admin`),
//! tenant staff (`clinic_admin`, `coach`) and `client`. Every request is
//! answered by [`RoleResolver`]; nothing else decides access.
//!
//! ## Request Flow
//!
//! 1. Client sends `Authorization: Bearer <access token>`
//! 2. [`Auth`] restores the session for that token from the registry
//! 3. The registry recovers unknown tokens from the auth provider and
//!    loads the profile row into an [`Identity`]
//! 4. Handlers and the route guard ask the resolver for a decision
//!
//! ## Security
//!
//! - Unknown role strings never produce an identity
//! - Demo break-glass identities exist only behind the `demo-accounts`
//!   feature and an explicit runtime flag

pub mod break_glass;
pub mod error;
pub mod extractor;
pub mod identity;
pub mod navigation;
pub mod requirement;
pub mod resolver;
pub mod roles;

pub use break_glass::BreakGlass;
pub use error::AuthError;
pub use extractor::{bearer_token, Auth, SessionToken, SystemAdminOnly};
pub use identity::{Identity, IdentityError};
pub use requirement::RoleRequirement;
pub use resolver::{AccessDecision, DenialReason, RoleResolver};
pub use roles::Role;
