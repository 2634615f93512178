//! Authorization-code exchange against the Kenni token endpoint
//!
//! Performs the `authorization_code` + PKCE grant and returns the raw
//! identity token. Retries, if any, are the caller's policy; this client
//! makes exactly one attempt.

use serde::Deserialize;

use crate::config::{ProviderConfig, OUTBOUND_USER_AGENT};
use crate::error::{ApiError, Result};
use crate::platform::HttpClient;

#[derive(Deserialize)]
struct TokenEndpointResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// Exchange an authorization code (plus its PKCE verifier) for a raw
/// identity token.
pub async fn exchange_code(
    token_endpoint: &str,
    auth_code: &str,
    pkce_verifier: &str,
    provider: &ProviderConfig,
    http: &dyn HttpClient,
) -> Result<String> {
    let body = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("grant_type", "authorization_code")
        .append_pair("code", auth_code)
        .append_pair("code_verifier", pkce_verifier)
        .append_pair("client_id", &provider.client_id)
        .append_pair("client_secret", &provider.client_secret)
        .append_pair("redirect_uri", &provider.redirect_uri)
        .finish();

    let response = http
        .post(
            token_endpoint,
            &[
                ("Content-Type", "application/x-www-form-urlencoded"),
                ("Accept", "application/json"),
                ("User-Agent", OUTBOUND_USER_AGENT),
            ],
            body.as_bytes(),
        )
        .await
        .map_err(|e| ApiError::upstream_unavailable(format!("token endpoint unreachable: {}", e)))?;

    if !response.is_success() {
        return Err(ApiError::upstream_rejected(
            response.status,
            "identity provider rejected the code exchange",
        ));
    }

    let token: TokenEndpointResponse = response.json().map_err(|e| {
        ApiError::malformed_upstream_response(format!("invalid token endpoint response: {}", e))
    })?;

    token
        .id_token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            ApiError::malformed_upstream_response("token endpoint response is missing 'id_token'")
        })
}
