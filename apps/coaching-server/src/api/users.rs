// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User endpoints.

use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::{navigation, Auth, Identity, Role};
use crate::state::AppState;

/// Response for GET /v1/users/me
#[derive(Debug, Serialize, ToSchema)]
pub struct UserMeResponse {
    /// User's unique ID (profile id)
    pub user_id: String,
    pub full_name: String,
    pub email: String,
    /// Role stored on the profile
    pub role: Role,
    /// Role the user is evaluated as (differs only for demo accounts)
    pub effective_role: Role,
    /// Clinic the user's data access is scoped to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinic_id: Option<String>,
    /// Coach or client record behind this user
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_record_id: Option<String>,
    /// Default landing page
    pub landing: &'static str,
}

impl UserMeResponse {
    fn new(identity: Identity, effective_role: Role) -> Self {
        Self {
            clinic_id: identity.tenant().map(str::to_string),
            user_id: identity.id,
            full_name: identity.full_name,
            email: identity.email,
            role: identity.role,
            effective_role,
            linked_record_id: identity.linked_record_id,
            landing: navigation::landing_for(Some(effective_role)),
        }
    }
}

/// Get the current signed-in user's information.
#[utoipa::path(
    get,
    path = "/v1/users/me",
    tag = "Users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User information", body = UserMeResponse),
        (status = 401, description = "Unauthorized - invalid or missing token"),
    )
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Auth(identity): Auth,
) -> Json<UserMeResponse> {
    let effective_role = state.guard.resolver().effective_role(&identity);
    Json(UserMeResponse::new(identity, effective_role))
}
