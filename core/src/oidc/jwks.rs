//! JWKS (JSON Web Key Set) handling
//!
//! Fetches the identity provider's signing keys and caches them by issuer.
//! Caching is a performance optimization only: cache failures degrade to a
//! network fetch, and a stale entry is refreshed at most once per login when
//! verification fails in a way key rotation would explain.

use jsonwebtoken::jwk::{Jwk, JwkSet};

use crate::config::{JWKS_CACHE_TTL_SECS, OUTBOUND_USER_AGENT};
use crate::error::{ApiError, Result};
use crate::oidc::discovery::DiscoveryDocument;
use crate::platform::{cache_get, cache_put, Cache, HttpClient};

/// A fetched key set together with where it came from.
///
/// `from_cache` lets the verifier decide whether a failure is worth one
/// fresh re-fetch (rotation) or is final.
#[derive(Debug)]
pub struct KeySource {
    jwks: JwkSet,
    pub from_cache: bool,
}

impl KeySource {
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.jwks.find(kid)
    }
}

fn cache_key(issuer: &str) -> String {
    format!("oidc:jwks:{}", issuer.trim_end_matches('/'))
}

/// Resolve the key set for an issuer, serving from cache when possible.
pub async fn resolve(
    discovery: &DiscoveryDocument,
    cache: &dyn Cache,
    http: &dyn HttpClient,
) -> Result<KeySource> {
    let key = cache_key(&discovery.issuer);

    match cache_get::<JwkSet>(cache, &key).await {
        Ok(Some(jwks)) => {
            return Ok(KeySource {
                jwks,
                from_cache: true,
            })
        }
        Ok(None) => {}
        Err(e) => tracing::warn!(issuer = %discovery.issuer, error = %e, "JWKS cache read failed"),
    }

    fetch_and_cache(discovery, cache, http).await
}

/// Resolve the key set for an issuer, bypassing and overwriting the cache.
///
/// Used after a verification failure that a rotated key would explain.
pub async fn resolve_fresh(
    discovery: &DiscoveryDocument,
    cache: &dyn Cache,
    http: &dyn HttpClient,
) -> Result<KeySource> {
    fetch_and_cache(discovery, cache, http).await
}

async fn fetch_and_cache(
    discovery: &DiscoveryDocument,
    cache: &dyn Cache,
    http: &dyn HttpClient,
) -> Result<KeySource> {
    let jwks = fetch_jwks(&discovery.jwks_uri, http).await?;

    let key = cache_key(&discovery.issuer);
    if let Err(e) = cache_put(cache, &key, &jwks, JWKS_CACHE_TTL_SECS).await {
        tracing::warn!(issuer = %discovery.issuer, error = %e, "JWKS cache write failed");
    }

    Ok(KeySource {
        jwks,
        from_cache: false,
    })
}

/// Fetch a JWKS document from a URI
async fn fetch_jwks(jwks_uri: &str, http: &dyn HttpClient) -> Result<JwkSet> {
    let response = http
        .get(
            jwks_uri,
            &[
                ("Accept", "application/json"),
                ("User-Agent", OUTBOUND_USER_AGENT),
            ],
        )
        .await
        .map_err(|e| ApiError::upstream_unavailable(format!("failed to fetch JWKS: {}", e)))?;

    if response.status != 200 {
        return Err(ApiError::upstream_unavailable(format!(
            "JWKS fetch returned HTTP {}",
            response.status
        )));
    }

    let jwks: JwkSet = response
        .json()
        .map_err(|e| ApiError::upstream_unavailable(format!("invalid JWKS document: {}", e)))?;

    Ok(jwks)
}
