// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit trail for authentication and access-control events.
//!
//! Events are kept in a bounded in-memory ring (oldest dropped first) and
//! mirrored to `tracing` under the `security` target.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use utoipa::ToSchema;

/// Default number of events retained.
pub const DEFAULT_AUDIT_CAPACITY: usize = 1000;

/// Types of auditable events.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    SignIn,
    SignInFailed,
    SignOut,
    SessionRestored,
    /// Ordinary denial, e.g. a coach opening a clinic view
    AccessDenied,
    /// Lower-privilege role reaching a reserved system path
    SecurityViolation,
    /// Profile carried a role outside the known set
    UnknownRole,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// User who triggered the event (if known).
    pub user_id: Option<String>,
    /// Role at the time of the event.
    pub role: Option<String>,
    /// Path being navigated to.
    pub path: Option<String>,
    /// Free-form detail.
    pub detail: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            user_id: None,
            role: None,
            path: None,
            detail: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_role(mut self, role: impl ToString) -> Self {
        self.role = Some(role.to_string());
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Bounded in-memory audit log.
pub struct AuditLog {
    events: RwLock<VecDeque<AuditEvent>>,
    capacity: usize,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(DEFAULT_AUDIT_CAPACITY)
    }
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: RwLock::new(VecDeque::with_capacity(capacity.min(DEFAULT_AUDIT_CAPACITY))),
            capacity,
        }
    }

    /// Record an event, evicting the oldest once full.
    pub async fn record(&self, event: AuditEvent) {
        let mut events = self.events.write().await;
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Most recent events first, optionally filtered.
    pub async fn recent(
        &self,
        event_type: Option<AuditEventType>,
        user_id: Option<&str>,
        limit: usize,
    ) -> Vec<AuditEvent> {
        self.events
            .read()
            .await
            .iter()
            .rev()
            .filter(|e| event_type.is_none_or(|t| e.event_type == t))
            .filter(|e| user_id.is_none_or(|u| e.user_id.as_deref() == Some(u)))
            .take(limit)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let event = AuditEvent::new(AuditEventType::AccessDenied)
            .with_user("user_1")
            .with_role("coach")
            .with_path("/clinic/dashboard")
            .with_detail("insufficient_role");

        assert_eq!(event.event_type, AuditEventType::AccessDenied);
        assert_eq!(event.user_id.as_deref(), Some("user_1"));
        assert_eq!(event.role.as_deref(), Some("coach"));
        assert_eq!(event.path.as_deref(), Some("/clinic/dashboard"));
    }

    #[tokio::test]
    async fn oldest_events_are_evicted() {
        let log = AuditLog::new(2);
        for user in ["a", "b", "c"] {
            log.record(AuditEvent::new(AuditEventType::SignIn).with_user(user))
                .await;
        }
        assert_eq!(log.len().await, 2);

        let users: Vec<_> = log
            .recent(None, None, 10)
            .await
            .into_iter()
            .filter_map(|e| e.user_id)
            .collect();
        assert_eq!(users, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn recent_filters_by_type_and_user() {
        let log = AuditLog::default();
        log.record(AuditEvent::new(AuditEventType::SignIn).with_user("u1"))
            .await;
        log.record(AuditEvent::new(AuditEventType::SecurityViolation).with_user("u1"))
            .await;
        log.record(AuditEvent::new(AuditEventType::SecurityViolation).with_user("u2"))
            .await;

        let violations = log
            .recent(Some(AuditEventType::SecurityViolation), None, 10)
            .await;
        assert_eq!(violations.len(), 2);

        let u1 = log
            .recent(Some(AuditEventType::SecurityViolation), Some("u1"), 10)
            .await;
        assert_eq!(u1.len(), 1);
        assert_eq!(u1[0].user_id.as_deref(), Some("u1"));
    }
}
