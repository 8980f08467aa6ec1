// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the application. Configuration is loaded from the environment
//! at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `BACKEND_URL` | Hosted auth/profile backend base URL | in-memory backend |
//! | `BACKEND_ANON_KEY` | Backend project key sent as `apikey` | Required with `BACKEND_URL` |
//! | `BACKEND_JWKS_URL` | JWKS endpoint for local token verification | Optional |
//! | `BACKEND_JWT_ISSUER` | Expected access token issuer | Optional |
//! | `SESSION_RECOVERY_TIMEOUT_MS` | Upper bound on session recovery | `5000` |
//! | `SESSION_CACHE_CAPACITY` | Sessions kept in memory | `1024` |
//! | `SECURITY_PATHS` | Comma-separated system-admin-only prefixes | `/admin/clinics,/admin/users,/admin/system,/admin/audit` |
//! | `DEMO_ACCOUNTS` | Enable demo break-glass identities (`demo-accounts` builds only) | `false` |
//! | `TLS_CERT_PATH` | PEM certificate chain | plain HTTP |
//! | `TLS_KEY_PATH` | PEM private key | plain HTTP |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::guard::routes::DEFAULT_SECURITY_PATHS;
use crate::session::registry::DEFAULT_SESSION_CAPACITY;
use crate::telemetry::LogFormat;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const BACKEND_URL_ENV: &str = "BACKEND_URL";
pub const BACKEND_ANON_KEY_ENV: &str = "BACKEND_ANON_KEY";
pub const BACKEND_JWKS_URL_ENV: &str = "BACKEND_JWKS_URL";
pub const BACKEND_JWT_ISSUER_ENV: &str = "BACKEND_JWT_ISSUER";
pub const SESSION_RECOVERY_TIMEOUT_ENV: &str = "SESSION_RECOVERY_TIMEOUT_MS";
pub const SESSION_CACHE_CAPACITY_ENV: &str = "SESSION_CACHE_CAPACITY";
pub const SECURITY_PATHS_ENV: &str = "SECURITY_PATHS";
pub const DEMO_ACCOUNTS_ENV: &str = "DEMO_ACCOUNTS";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

/// Default upper bound on session recovery.
///
/// A user whose session cannot be recovered in this time is treated as
/// signed out instead of waiting on a loading screen forever.
pub const DEFAULT_RECOVERY_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error("{present} is set but {missing} is not")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
    #[error("DEMO_ACCOUNTS=true requires a build with the `demo-accounts` feature")]
    DemoAccountsUnavailable,
}

/// Hosted backend connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: Url,
    pub anon_key: String,
    pub jwks_url: Option<String>,
    pub jwt_issuer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Typed application configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` runs against the in-memory backend.
    pub backend: Option<BackendConfig>,
    pub recovery_timeout: Duration,
    pub session_capacity: usize,
    pub security_paths: Vec<String>,
    pub demo_accounts: bool,
    pub tls: Option<TlsConfig>,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            backend: None,
            recovery_timeout: DEFAULT_RECOVERY_TIMEOUT,
            session_capacity: DEFAULT_SESSION_CAPACITY,
            security_paths: DEFAULT_SECURITY_PATHS.iter().map(|p| p.to_string()).collect(),
            demo_accounts: false,
            tls: None,
            log_format: LogFormat::Pretty,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get(PORT_ENV) {
            Some(raw) => raw.parse().map_err(|e| invalid(PORT_ENV, &raw, e))?,
            None => defaults.port,
        };

        let backend = match (get(BACKEND_URL_ENV), get(BACKEND_ANON_KEY_ENV)) {
            (Some(raw), Some(anon_key)) => Some(BackendConfig {
                url: parse_base_url(&raw)?,
                anon_key,
                jwks_url: get(BACKEND_JWKS_URL_ENV),
                jwt_issuer: get(BACKEND_JWT_ISSUER_ENV),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    present: BACKEND_URL_ENV,
                    missing: BACKEND_ANON_KEY_ENV,
                })
            }
            (None, _) => None,
        };

        let recovery_timeout = match get(SESSION_RECOVERY_TIMEOUT_ENV) {
            Some(raw) => {
                let ms: u64 = raw
                    .parse()
                    .map_err(|e| invalid(SESSION_RECOVERY_TIMEOUT_ENV, &raw, e))?;
                if ms == 0 {
                    return Err(invalid(SESSION_RECOVERY_TIMEOUT_ENV, &raw, "must be positive"));
                }
                Duration::from_millis(ms)
            }
            None => defaults.recovery_timeout,
        };

        let session_capacity = match get(SESSION_CACHE_CAPACITY_ENV) {
            Some(raw) => {
                let n: usize = raw
                    .parse()
                    .map_err(|e| invalid(SESSION_CACHE_CAPACITY_ENV, &raw, e))?;
                if n == 0 {
                    return Err(invalid(SESSION_CACHE_CAPACITY_ENV, &raw, "must be positive"));
                }
                n
            }
            None => defaults.session_capacity,
        };

        let security_paths = match get(SECURITY_PATHS_ENV) {
            Some(raw) => parse_security_paths(&raw)?,
            None => defaults.security_paths,
        };

        let demo_accounts = match get(DEMO_ACCOUNTS_ENV) {
            Some(raw) => parse_bool(DEMO_ACCOUNTS_ENV, &raw)?,
            None => false,
        };
        if demo_accounts && !cfg!(feature = "demo-accounts") {
            return Err(ConfigError::DemoAccountsUnavailable);
        }

        let tls = match (get(TLS_CERT_PATH_ENV), get(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsConfig {
                cert_path: cert.into(),
                key_path: key.into(),
            }),
            (Some(_), None) => {
                return Err(ConfigError::Incomplete {
                    present: TLS_CERT_PATH_ENV,
                    missing: TLS_KEY_PATH_ENV,
                })
            }
            (None, Some(_)) => {
                return Err(ConfigError::Incomplete {
                    present: TLS_KEY_PATH_ENV,
                    missing: TLS_CERT_PATH_ENV,
                })
            }
            (None, None) => None,
        };

        let log_format = match get(LOG_FORMAT_ENV) {
            Some(raw) => raw
                .parse()
                .map_err(|e: String| invalid(LOG_FORMAT_ENV, &raw, e))?,
            None => defaults.log_format,
        };

        Ok(Self {
            host: get(HOST_ENV).unwrap_or(defaults.host),
            port,
            backend,
            recovery_timeout,
            session_capacity,
            security_paths,
            demo_accounts,
            tls,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|e| invalid(HOST_ENV, &raw, e))
    }
}

fn invalid(var: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::Invalid {
        var,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Base URLs must end in `/` so relative endpoint joins keep the full path.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    let url = Url::parse(&with_slash).map_err(|e| invalid(BACKEND_URL_ENV, raw, e))?;
    match url.scheme() {
        "https" | "http" => Ok(url),
        other => Err(invalid(BACKEND_URL_ENV, raw, format!("unsupported scheme {other}"))),
    }
}

fn parse_security_paths(raw: &str) -> Result<Vec<String>, ConfigError> {
    let paths: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if let Some(bad) = paths.iter().find(|p| !p.starts_with('/')) {
        return Err(invalid(SECURITY_PATHS_ENV, raw, format!("{bad} is not an absolute path")));
    }
    Ok(paths)
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(var, raw, "expected true or false")),
    }
}
