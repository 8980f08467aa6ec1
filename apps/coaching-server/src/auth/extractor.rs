// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for signed-in users.
//!
//! Use the `Auth` extractor in handlers to require a session:
//!
//! ```rust,ignore
//! async fn my_handler(Auth(identity): Auth) -> impl IntoResponse {
//!     // identity is the resolved Identity for the bearer token
//! }
//! ```

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use super::{AuthError, Identity, RoleRequirement};
use crate::session::SessionState;
use crate::state::AppState;

/// Pull the bearer token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let header = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::InvalidAuthHeader)?;
    if token.is_empty() {
        return Err(AuthError::InvalidAuthHeader);
    }
    Ok(token)
}

/// Extractor for signed-in users.
///
/// Restores the session for the bearer token through the registry, so the
/// first request after a restart recovers the session from the backend.
pub struct Auth(pub Identity);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        // The guard middleware may already have resolved the identity
        if let Some(identity) = parts.extensions.get::<Identity>().cloned() {
            return Ok(Auth(identity));
        }

        let token = bearer_token(&parts.headers)?;
        match state.registry.restore(token).await {
            SessionState::Authenticated(identity) => Ok(Auth(identity)),
            SessionState::Loading => Err(AuthError::SessionLoading),
            SessionState::Anonymous => Err(AuthError::InvalidSession),
        }
    }
}

/// The raw bearer token, for handlers that act on the session itself.
pub struct SessionToken(pub String);

impl<S: Send + Sync> FromRequestParts<S> for SessionToken {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        bearer_token(&parts.headers).map(|t| SessionToken(t.to_string()))
    }
}

/// Extractor that requires a platform (system or super) admin.
///
/// Goes through the role resolver like every other access decision.
pub struct SystemAdminOnly(pub Identity);

impl FromRequestParts<AppState> for SystemAdminOnly {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Auth(identity) = Auth::from_request_parts(parts, state).await?;

        if !state
            .guard
            .resolver()
            .has_access(Some(&identity), &RoleRequirement::system_only())
        {
            tracing::info!(
                target: "security",
                user_id = %identity.id,
                role = %identity.role,
                "Admin endpoint denied"
            );
            return Err(AuthError::InsufficientPermissions);
        }

        Ok(SystemAdminOnly(identity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{seeded_state, token_for};
    use axum::http::Request;

    fn parts_with(token: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        assert!(matches!(bearer_token(&headers), Err(AuthError::MissingAuthHeader)));

        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidAuthHeader)));

        headers.insert(AUTHORIZATION, "Bearer  ".parse().unwrap());
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidAuthHeader)));

        headers.insert(AUTHORIZATION, "Bearer tok_1".parse().unwrap());
        assert_eq!(bearer_token(&headers).unwrap(), "tok_1");
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (state, _backend) = seeded_state().await;
        let mut parts = parts_with(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_resolves_signed_in_user() {
        let (state, _backend) = seeded_state().await;
        let token = token_for(&state, "coach").await;
        let mut parts = parts_with(Some(&token));

        let Auth(identity) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(identity.id, "coach_1");
    }

    #[tokio::test]
    async fn auth_extractor_rejects_unknown_token() {
        let (state, _backend) = seeded_state().await;
        let mut parts = parts_with(Some("not-a-session"));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidSession)));
    }

    #[tokio::test]
    async fn system_admin_only_rejects_clinic_admin() {
        let (state, _backend) = seeded_state().await;
        let token = token_for(&state, "clinic_admin").await;
        let mut parts = parts_with(Some(&token));

        let result = SystemAdminOnly::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InsufficientPermissions)));
    }

    #[tokio::test]
    async fn system_admin_only_accepts_super_admin() {
        let (state, _backend) = seeded_state().await;
        let token = token_for(&state, "super_admin").await;
        let mut parts = parts_with(Some(&token));

        let SystemAdminOnly(identity) = SystemAdminOnly::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(identity.id, "super_admin_1");
    }
}
