// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Navigation targets for the frontend router.

use axum::Json;

use crate::auth::navigation::NavigationTargets;

/// Landing pages per role, plus the login and unauthorized pages.
#[utoipa::path(
    get,
    path = "/v1/navigation",
    tag = "Navigation",
    responses(
        (status = 200, description = "Navigation targets", body = NavigationTargets)
    )
)]
pub async fn navigation_targets() -> Json<NavigationTargets> {
    Json(NavigationTargets::get())
}
