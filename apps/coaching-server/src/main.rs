// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use coaching_server::{
    api::router,
    config::AppConfig,
    provider::{InMemoryBackend, JwksManager, ProviderError, RestBackend},
    session::AuthEventListener,
    state::AppState,
    telemetry,
};

/// Time given to in-flight requests after a shutdown signal.
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(10);

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {e}");
            std::process::exit(2);
        }
    };
    telemetry::init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

async fn run(config: AppConfig) -> Result<(), BoxError> {
    let addr = config.bind_addr()?;
    let state = build_state(&config)?;

    let shutdown = CancellationToken::new();
    let listener = tokio::spawn(
        AuthEventListener::new(state.registry.clone()).run(shutdown.clone()),
    );

    let handle: Handle<SocketAddr> = Handle::new();
    tokio::spawn(shutdown_signal(handle.clone(), shutdown.clone()));

    let app = router(state);

    match &config.tls {
        Some(tls) => {
            // Install the ring crypto provider for rustls (must be done before any TLS operations)
            if rustls::crypto::ring::default_provider().install_default().is_err() {
                warn!("rustls crypto provider already installed");
            }
            let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;

            info!("Coaching server listening on https://{addr} (docs at /docs)");
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
        None => {
            info!("Coaching server listening on http://{addr} (docs at /docs)");
            axum_server::bind(addr)
                .handle(handle)
                .serve(app.into_make_service())
                .await?;
        }
    }

    shutdown.cancel();
    if let Err(e) = listener.await {
        warn!(error = %e, "Auth state listener ended abnormally");
    }
    info!("Server stopped");
    Ok(())
}

/// Wire the auth and profile backends named by the configuration.
fn build_state(config: &AppConfig) -> Result<AppState, ProviderError> {
    if config.demo_accounts {
        warn!("Demo break-glass accounts are ENABLED; never run this build in production");
    }

    let Some(backend) = &config.backend else {
        warn!("BACKEND_URL not set; serving from an empty in-memory backend");
        let memory = Arc::new(InMemoryBackend::new());
        return Ok(AppState::from_config(config, memory.clone(), memory));
    };

    let mut rest = RestBackend::new(backend.url.clone(), backend.anon_key.clone())?;
    let jwks = backend.jwks_url.as_ref().map(|url| {
        let manager = JwksManager::new(url.clone(), rest.http_client());
        match &backend.jwt_issuer {
            Some(issuer) => manager.with_issuer(issuer.clone()),
            None => manager,
        }
    });
    if let Some(jwks) = &jwks {
        rest = rest.with_jwks(jwks.clone());
    }

    info!(
        backend = %backend.url,
        local_verification = jwks.is_some(),
        recovery_timeout_ms = config.recovery_timeout.as_millis() as u64,
        "Using hosted backend"
    );

    let rest = Arc::new(rest);
    let state = AppState::from_config(config, rest.clone(), rest);
    Ok(match jwks {
        Some(jwks) => state.with_jwks(jwks),
        None => state,
    })
}

async fn shutdown_signal(handle: Handle<SocketAddr>, shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
    handle.graceful_shutdown(Some(SHUTDOWN_GRACE_PERIOD));
}
