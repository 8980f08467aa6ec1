// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Sign-in and sign-out endpoints.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    auth::{navigation, Identity, SessionToken},
    error::ApiError,
    state::AppState,
};

/// Request body for POST /v1/auth/login
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Response for POST /v1/auth/login
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Bearer token for subsequent requests.
    pub access_token: String,
    pub identity: Identity,
    /// Where the frontend should navigate next.
    pub landing: &'static str,
}

/// Sign in with email and password.
#[utoipa::path(
    post,
    path = "/v1/auth/login",
    tag = "Session",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Missing email or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Account has no usable profile"),
        (status = 503, description = "Auth backend unavailable")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("email and password are required"));
    }

    let (access_token, identity) = state.registry.sign_in(email, &request.password).await?;
    let landing = navigation::landing_for(Some(state.guard.resolver().effective_role(&identity)));

    Ok(Json(LoginResponse {
        access_token,
        identity,
        landing,
    }))
}

/// Sign out the session behind the bearer token.
///
/// Always succeeds locally, even if the backend could not be told.
#[utoipa::path(
    post,
    path = "/v1/auth/logout",
    tag = "Session",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Signed out"),
        (status = 401, description = "Missing bearer token")
    )
)]
pub async fn logout(State(state): State<AppState>, SessionToken(token): SessionToken) -> StatusCode {
    state.registry.sign_out(&token).await;
    StatusCode::NO_CONTENT
}
