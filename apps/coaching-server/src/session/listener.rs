// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Auth State Listener
//!
//! Background task that applies provider auth state changes (token refresh
//! and sign-out) to the session registry so a revoked session stops being
//! served on the very next navigation.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::SessionRegistry;
use crate::provider::AuthEvent;

pub struct AuthEventListener {
    registry: Arc<SessionRegistry>,
    events: broadcast::Receiver<AuthEvent>,
}

impl AuthEventListener {
    /// Subscribe to the registry's auth provider.
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        let events = registry.auth_provider().subscribe();
        Self { registry, events }
    }

    /// Run until the cancellation token fires or the provider goes away.
    ///
    /// ```rust,ignore
    /// tokio::spawn(listener.run(shutdown.clone()));
    /// ```
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Auth state listener starting");

        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Auth state listener shutting down");
                    return;
                }
                event = self.events.recv() => event,
            };

            match event {
                Ok(event) => {
                    debug!(event = event_name(&event), "Applying auth state change");
                    self.registry.apply_event(event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Auth state listener lagged; some events were dropped");
                }
                Err(RecvError::Closed) => {
                    info!("Auth event channel closed; listener exiting");
                    return;
                }
            }
        }
    }
}

fn event_name(event: &AuthEvent) -> &'static str {
    match event {
        AuthEvent::SignedIn(_) => "signed_in",
        AuthEvent::TokenRefreshed { .. } => "token_refreshed",
        AuthEvent::SignedOut { .. } => "signed_out",
    }
}
