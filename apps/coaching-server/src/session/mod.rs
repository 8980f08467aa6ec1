// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Module
//!
//! - [`SessionHolder`] - the signed-in identity for one browser session
//! - [`SessionRegistry`] - all live sessions, keyed by access token
//! - [`AuthEventListener`] - applies provider auth state changes to the registry

pub mod holder;
pub mod listener;
pub mod registry;

pub use holder::{SessionHolder, SessionState};
pub use listener::AuthEventListener;
pub use registry::SessionRegistry;

use crate::auth::IdentityError;
use crate::provider::ProviderError;

/// Why a session could not be established.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("no profile found for user {0}")]
    ProfileMissing(String),
    #[error(transparent)]
    Identity(#[from] IdentityError),
    #[error("session recovery timed out")]
    Timeout,
}
