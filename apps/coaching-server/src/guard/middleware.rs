// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum middleware running every view navigation through the
//! [`RouteGuard`](super::RouteGuard).
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/app/{*path}", get(views::render_view))
//!     .route_layer(axum::middleware::from_fn_with_state(state.clone(), guard_navigation));
//! ```
//!
//! | Outcome | Response |
//! |---------|----------|
//! | render | request continues with [`RenderedView`] and the identity in extensions |
//! | loading | `202 Accepted` |
//! | anonymous | `303` to `/login` |
//! | deny | `303` to the landing page, `x-access-notice` header, JSON notice |

use axum::{
    extract::{Request, State},
    http::{header::LOCATION, HeaderName, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;

use super::{GuardOutcome, GuardState, Shell};
use crate::audit::{AuditEvent, AuditEventType};
use crate::auth::{bearer_token, navigation, DenialReason};
use crate::session::SessionState;
use crate::state::AppState;

/// Mount point of guarded views.
pub const APP_PREFIX: &str = "/app";

/// Header carrying the user-visible denial notice.
pub static ACCESS_NOTICE_HEADER: HeaderName = HeaderName::from_static("x-access-notice");

/// View approved by the guard, handed to the view handler.
#[derive(Debug, Clone)]
pub struct RenderedView {
    pub view: String,
    pub shell: Shell,
}

/// Body of non-render guard responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct GuardResponse {
    pub state: GuardState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<&'static str>,
}

/// Guard middleware for `/app/{*path}`.
pub async fn guard_navigation(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let path = view_path(request.uri().path()).to_string();

    let token = bearer_token(request.headers()).ok().map(str::to_string);
    let session = match token {
        Some(token) => state.registry.restore(&token).await,
        None => SessionState::Anonymous,
    };

    let outcome = state.guard.evaluate(&session, &path);
    audit_outcome(&state, &outcome, &path).await;

    match outcome {
        GuardOutcome::Render {
            view,
            identity,
            shell,
        } => {
            request.extensions_mut().insert(identity);
            request.extensions_mut().insert(RenderedView {
                view,
                shell: *shell,
            });
            next.run(request).await
        }
        GuardOutcome::Loading => (
            StatusCode::ACCEPTED,
            Json(GuardResponse {
                state: GuardState::Loading,
                redirect: None,
                reason: None,
                notice: None,
            }),
        )
            .into_response(),
        GuardOutcome::RedirectToLogin => see_other(
            navigation::LOGIN,
            GuardResponse {
                state: GuardState::Anonymous,
                redirect: Some(navigation::LOGIN),
                reason: None,
                notice: None,
            },
        ),
        GuardOutcome::Deny {
            redirect,
            reason,
            notice,
            ..
        } => {
            let mut response = see_other(
                &app_location(redirect),
                GuardResponse {
                    state: GuardState::Unauthorized,
                    redirect: Some(redirect),
                    reason: Some(reason),
                    notice: Some(notice),
                },
            );
            response
                .headers_mut()
                .insert(ACCESS_NOTICE_HEADER.clone(), HeaderValue::from_static(notice));
            response
        }
    }
}

/// Path as the guard sees it, without the mount prefix.
fn view_path(uri_path: &str) -> &str {
    match uri_path.strip_prefix(APP_PREFIX) {
        Some("") | None => "/",
        Some(rest) => rest,
    }
}

/// Landing pages are guarded views themselves, served under the mount.
fn app_location(target: &str) -> String {
    if target == navigation::LOGIN {
        target.to_string()
    } else {
        format!("{APP_PREFIX}{target}")
    }
}

fn see_other(location: &str, body: GuardResponse) -> Response {
    let mut response = (StatusCode::SEE_OTHER, Json(body)).into_response();
    if let Ok(value) = HeaderValue::from_str(location) {
        response.headers_mut().insert(LOCATION, value);
    }
    response
}

async fn audit_outcome(state: &AppState, outcome: &GuardOutcome, path: &str) {
    let GuardOutcome::Deny {
        reason,
        user: Some((user_id, role)),
        ..
    } = outcome
    else {
        return;
    };

    let event_type = match reason {
        DenialReason::SecurityPath => AuditEventType::SecurityViolation,
        _ => AuditEventType::AccessDenied,
    };
    state
        .audit
        .record(
            AuditEvent::new(event_type)
                .with_user(user_id)
                .with_role(role)
                .with_path(path)
                .with_detail(format!("{reason:?}")),
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_mount_prefix() {
        assert_eq!(view_path("/app/coach/dashboard"), "/coach/dashboard");
        assert_eq!(view_path("/app"), "/");
        assert_eq!(view_path("/elsewhere"), "/");
    }

    #[test]
    fn deny_locations_stay_under_mount() {
        assert_eq!(app_location("/clinic/dashboard"), "/app/clinic/dashboard");
        assert_eq!(app_location("/login"), "/login");
    }
}
