// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Guarded view endpoint.
//!
//! Only reached after the guard middleware rendered the navigation; the
//! approved view and identity arrive through request extensions.

use axum::{Extension, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::Identity;
use crate::guard::{middleware::RenderedView, Shell};

/// A view rendered inside the authenticated shell.
#[derive(Debug, Serialize, ToSchema)]
pub struct ViewModel {
    /// Name of the view to render.
    pub view: String,
    pub identity: Identity,
    pub shell: Shell,
}

/// Render a protected view.
#[utoipa::path(
    get,
    path = "/app/{path}",
    tag = "Views",
    params(("path" = String, Path, description = "View path, e.g. coach/dashboard")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "View rendered", body = ViewModel),
        (status = 202, description = "Session still loading", body = crate::guard::middleware::GuardResponse),
        (status = 303, description = "Redirect to login or the role's landing page", body = crate::guard::middleware::GuardResponse)
    )
)]
pub async fn render_view(
    Extension(rendered): Extension<RenderedView>,
    Extension(identity): Extension<Identity>,
) -> Json<ViewModel> {
    Json(ViewModel {
        view: rendered.view,
        identity,
        shell: rendered.shell,
    })
}
