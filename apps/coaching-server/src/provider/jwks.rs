// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local verification of backend access tokens against the backend JWKS.
//!
//! When `BACKEND_JWKS_URL` is configured, session recovery verifies the
//! access token signature, expiry and issuer locally instead of asking the
//! backend on every request. Keys are cached with a TTL.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{AuthSession, ProviderError};

/// Default JWKS cache TTL (5 minutes).
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Claims carried by backend access tokens.
#[derive(Debug, Deserialize)]
struct AccessTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    exp: Option<i64>,
}

struct CacheEntry {
    jwks: JwkSet,
    fetched_at: Instant,
}

/// JWKS fetcher and token verifier.
#[derive(Clone)]
pub struct JwksManager {
    jwks_url: String,
    issuer: Option<String>,
    audience: Option<String>,
    cache_ttl: Duration,
    cache: Arc<RwLock<Option<CacheEntry>>>,
    client: reqwest::Client,
}

impl JwksManager {
    pub fn new(jwks_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            jwks_url: jwks_url.into(),
            issuer: None,
            audience: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            cache: Arc::new(RwLock::new(None)),
            client,
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    /// Verify an access token and turn its claims into a session.
    pub async fn verify(&self, token: &str) -> Result<AuthSession, ProviderError> {
        let header = decode_header(token).map_err(|_| ProviderError::InvalidSession)?;

        let (key, algorithm) = match header.kid.as_deref() {
            Some(kid) => self.decoding_key(kid).await?,
            None => self.any_decoding_key().await?,
        };

        let mut validation = Validation::new(algorithm);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let data = decode::<AccessTokenClaims>(token, &key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature
                | ErrorKind::InvalidSignature
                | ErrorKind::InvalidIssuer
                | ErrorKind::InvalidAudience
                | ErrorKind::ImmatureSignature => ProviderError::InvalidSession,
                _ => ProviderError::Decode(format!("access token: {e}")),
            }
        })?;

        Ok(AuthSession {
            access_token: token.to_string(),
            user_id: data.claims.sub,
            email: data.claims.email.unwrap_or_default(),
            expires_at: data.claims.exp,
        })
    }

    /// Force refresh the key cache.
    pub async fn refresh(&self) -> Result<(), ProviderError> {
        let jwks = self.fetch().await?;
        *self.cache.write().await = Some(CacheEntry {
            jwks,
            fetched_at: Instant::now(),
        });
        Ok(())
    }

    /// True if keys are cached and within TTL.
    pub async fn is_cached(&self) -> bool {
        self.cache
            .read()
            .await
            .as_ref()
            .is_some_and(|entry| entry.fetched_at.elapsed() < self.cache_ttl)
    }

    async fn keys(&self) -> Result<JwkSet, ProviderError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = &*cache {
                if entry.fetched_at.elapsed() < self.cache_ttl {
                    return Ok(entry.jwks.clone());
                }
            }
        }

        let jwks = self.fetch().await?;
        *self.cache.write().await = Some(CacheEntry {
            jwks: jwks.clone(),
            fetched_at: Instant::now(),
        });
        Ok(jwks)
    }

    async fn fetch(&self) -> Result<JwkSet, ProviderError> {
        let response = self
            .client
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message: "JWKS endpoint".to_string(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Decode(e.to_string()))
    }

    async fn decoding_key(&self, kid: &str) -> Result<(DecodingKey, Algorithm), ProviderError> {
        let jwks = self.keys().await?;
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.common.key_id.as_deref() == Some(kid))
            .ok_or(ProviderError::InvalidSession)?;
        to_decoding_key(jwk)
    }

    async fn any_decoding_key(&self) -> Result<(DecodingKey, Algorithm), ProviderError> {
        let jwks = self.keys().await?;
        jwks.keys
            .iter()
            .find_map(|jwk| to_decoding_key(jwk).ok())
            .ok_or(ProviderError::InvalidSession)
    }
}

fn to_decoding_key(jwk: &Jwk) -> Result<(DecodingKey, Algorithm), ProviderError> {
    match &jwk.algorithm {
        AlgorithmParameters::RSA(rsa) => {
            let key = DecodingKey::from_rsa_components(&rsa.n, &rsa.e)
                .map_err(|e| ProviderError::Decode(format!("RSA key: {e}")))?;
            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::RS384) => Algorithm::RS384,
                Some(KeyAlgorithm::RS512) => Algorithm::RS512,
                _ => Algorithm::RS256,
            };
            Ok((key, alg))
        }
        AlgorithmParameters::EllipticCurve(ec) => {
            let key = DecodingKey::from_ec_components(&ec.x, &ec.y)
                .map_err(|e| ProviderError::Decode(format!("EC key: {e}")))?;
            let alg = match jwk.common.key_algorithm {
                Some(KeyAlgorithm::ES384) => Algorithm::ES384,
                _ => Algorithm::ES256,
            };
            Ok((key, alg))
        }
        _ => Err(ProviderError::Decode("unsupported key type in JWKS".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwksManager {
        JwksManager::new(
            "https://project.backend.test/auth/v1/.well-known/jwks.json",
            reqwest::Client::new(),
        )
    }

    #[test]
    fn builder_sets_fields() {
        let manager = manager()
            .with_issuer("https://project.backend.test/auth/v1")
            .with_audience("authenticated")
            .with_cache_ttl(Duration::from_secs(60));
        assert_eq!(
            manager.jwks_url(),
            "https://project.backend.test/auth/v1/.well-known/jwks.json"
        );
        assert_eq!(manager.audience.as_deref(), Some("authenticated"));
        assert_eq!(manager.cache_ttl, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn cache_initially_empty() {
        assert!(!manager().is_cached().await);
    }

    #[tokio::test]
    async fn garbage_token_is_an_invalid_session() {
        let err = manager().verify("not-a-jwt").await.unwrap_err();
        assert_eq!(err, ProviderError::InvalidSession);
    }
}
