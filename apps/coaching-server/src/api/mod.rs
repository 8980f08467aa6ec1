// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    audit::{AuditEvent, AuditEventType},
    auth::{navigation::NavigationTargets, DenialReason, Identity, Role},
    guard::{
        middleware::{guard_navigation, GuardResponse},
        shell::{NavItem, TopBar},
        GuardState, Shell,
    },
    state::AppState,
};

pub mod admin;
pub mod health;
pub mod navigation;
pub mod session;
pub mod users;
pub mod views;

pub fn router(state: AppState) -> Router {
    let v1_routes = Router::new()
        .route("/auth/login", post(session::login))
        .route("/auth/logout", post(session::logout))
        .route("/users/me", get(users::get_current_user))
        .route("/navigation", get(navigation::navigation_targets))
        .route("/admin/audit", get(admin::query_audit_logs));

    // Every view navigation passes the route guard first
    let view_routes = Router::new()
        .route("/app/{*path}", get(views::render_view))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            guard_navigation,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .merge(view_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        health::liveness,
        health::readiness,
        session::login,
        session::logout,
        users::get_current_user,
        navigation::navigation_targets,
        views::render_view,
        admin::query_audit_logs
    ),
    components(
        schemas(
            Role,
            Identity,
            DenialReason,
            GuardState,
            GuardResponse,
            Shell,
            TopBar,
            NavItem,
            NavigationTargets,
            AuditEvent,
            AuditEventType,
            session::LoginRequest,
            session::LoginResponse,
            users::UserMeResponse,
            views::ViewModel,
            admin::AuditLogResponse,
            health::ReadyResponse,
            health::HealthResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Session", description = "Sign-in and sign-out"),
        (name = "Users", description = "Current user"),
        (name = "Navigation", description = "Role landing pages"),
        (name = "Views", description = "Guarded view navigation"),
        (name = "Admin", description = "Platform admin tooling")
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
            );
        }
    }
}
