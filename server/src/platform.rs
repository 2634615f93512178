//! Native platform implementations
//!
//! Implements the core platform traits with native libraries:
//! - Cache: moka in-memory cache with TTL
//! - HttpClient: reqwest with a bounded request timeout
//! - Clock: std::time::SystemTime
//! - Environment: process environment (secrets arrive as injected env vars)

use async_trait::async_trait;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use kenni_bridge_core::error::{ApiError, Result};
use kenni_bridge_core::platform::{Cache, Clock, Environment, HttpClient, HttpResponse};

/// Upper bound on any single outbound request
const OUTBOUND_TIMEOUT_SECS: u64 = 10;

/// In-memory cache with TTL
pub struct MokaCache {
    cache: moka::future::Cache<String, Vec<u8>>,
}

impl MokaCache {
    pub fn new() -> Self {
        Self {
            cache: moka::future::Cache::builder()
                .max_capacity(1000)
                .time_to_live(Duration::from_secs(3600))
                .build(),
        }
    }
}

#[async_trait]
impl Cache for MokaCache {
    async fn get_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.cache.get(key).await)
    }

    async fn put_bytes(&self, key: &str, value: &[u8], ttl_secs: u64) -> Result<()> {
        // The cache-wide TTL applies; per-entry TTLs would need moka's expiry
        // policy API and every entry here shares the JWKS lifetime anyway.
        let _ = ttl_secs;
        self.cache.insert(key.to_string(), value.to_vec()).await;
        Ok(())
    }
}

/// reqwest-based HTTP client
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(OUTBOUND_TIMEOUT_SECS))
            .build()
            .expect("failed to construct HTTP client");
        Self { client }
    }

    fn map_transport_error(context: &str, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::upstream_unavailable(format!("{} timed out", context))
        } else {
            ApiError::upstream_unavailable(format!("{} failed: {}", context, e))
        }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpResponse> {
        let mut builder = self.client.get(url);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_transport_error("HTTP GET", e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_transport_error("response read", e))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }

    async fn post(&self, url: &str, headers: &[(&str, &str)], body: &[u8]) -> Result<HttpResponse> {
        let mut builder = self.client.post(url).body(body.to_vec());
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Self::map_transport_error("HTTP POST", e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_transport_error("response read", e))?
            .to_vec();

        Ok(HttpResponse { status, body })
    }
}

/// System clock using std::time
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs()
    }
}

/// Process environment; secrets are expected to be injected as env vars by
/// the deployment (secret-manager mounts or CI).
pub struct ProcessEnv;

impl Environment for ProcessEnv {
    fn get_var(&self, name: &str) -> Result<String> {
        std::env::var(name)
            .map_err(|_| ApiError::configuration(format!("environment variable '{}' not set", name)))
    }

    fn get_secret(&self, name: &str) -> Result<String> {
        std::env::var(name)
            .map_err(|_| ApiError::configuration(format!("secret '{}' not found in environment", name)))
    }
}
