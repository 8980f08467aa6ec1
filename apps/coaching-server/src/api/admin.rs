// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only API endpoints.
//!
//! These endpoints require a platform admin role (`admin` or
//! `super_admin`). Clinic admins are tenant staff and are refused.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit::{AuditEvent, AuditEventType},
    auth::SystemAdminOnly,
    state::AppState,
};

const DEFAULT_AUDIT_LIMIT: usize = 100;
const MAX_AUDIT_LIMIT: usize = 1000;

/// Query parameters for audit log queries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQueryParams {
    /// Filter by event type.
    pub event_type: Option<AuditEventType>,
    /// Filter by user ID.
    pub user_id: Option<String>,
    /// Maximum number of results (default 100, max 1000).
    pub limit: Option<usize>,
}

/// Response for audit log queries.
#[derive(Debug, Serialize, ToSchema)]
pub struct AuditLogResponse {
    /// Matching events, newest first.
    pub events: Vec<AuditEvent>,
    /// Number of events returned.
    pub total: usize,
}

/// Query recent audit events.
#[utoipa::path(
    get,
    path = "/v1/admin/audit",
    tag = "Admin",
    params(AuditQueryParams),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Audit events", body = AuditLogResponse),
        (status = 400, description = "Invalid query parameters"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not authorized (platform admin required)")
    )
)]
pub async fn query_audit_logs(
    SystemAdminOnly(admin): SystemAdminOnly,
    Query(params): Query<AuditQueryParams>,
    State(state): State<AppState>,
) -> Json<AuditLogResponse> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .min(MAX_AUDIT_LIMIT);

    let events = state
        .audit
        .recent(params.event_type, params.user_id.as_deref(), limit)
        .await;

    tracing::debug!(admin_id = %admin.id, returned = events.len(), "Audit log queried");

    Json(AuditLogResponse {
        total: events.len(),
        events,
    })
}
