//! Federated login orchestration
//!
//! Drives one login attempt end to end: request validation, code exchange,
//! identity-token verification, optional secondary corroboration, account
//! provisioning, and session-credential issuance. No step is retried within
//! one invocation (the JWKS rotation re-fetch inside verification is the one
//! exception).

use serde::{Deserialize, Serialize};

use crate::account::{self, AccountStore};
use crate::config::{Config, NameMismatchPolicy};
use crate::error::{ApiError, Result};
use crate::kenni;
use crate::oidc::{self, IdentityClaims};
use crate::platform::{Cache, Clock, Environment, HttpClient};
use crate::session::SessionSigner;

/// Login request body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub kenni_auth_code: String,
    #[serde(default)]
    pub pkce_code_verifier: String,
    #[serde(default)]
    pub google_id_token: Option<String>,
}

/// Login response body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub custom_token: String,
}

/// Handle one login attempt.
pub async fn handle(
    request: LoginRequest,
    store: &dyn AccountStore,
    cache: &dyn Cache,
    http: &dyn HttpClient,
    env: &dyn Environment,
    clock: &dyn Clock,
    signer: &dyn SessionSigner,
) -> Result<LoginResponse> {
    // Shape checks come first: nothing leaves the process for a request that
    // is missing required fields.
    if request.kenni_auth_code.trim().is_empty() {
        return Err(ApiError::invalid_request("'kenniAuthCode' is required"));
    }
    if request.pkce_code_verifier.trim().is_empty() {
        return Err(ApiError::invalid_request("'pkceCodeVerifier' is required"));
    }

    let config = Config::from_env(env)?;

    let discovery = oidc::fetch_discovery(&config.kenni.issuer_url, http).await?;
    let token_endpoint = discovery.token_endpoint()?;

    let raw_token = kenni::exchange_code(
        token_endpoint,
        &request.kenni_auth_code,
        &request.pkce_code_verifier,
        &config.kenni,
        http,
    )
    .await?;

    let verified = oidc::verify_with_rotation_retry(
        &raw_token,
        &discovery,
        &config.kenni.client_id,
        &config.kenni.issuer_url,
        cache,
        http,
        clock,
    )
    .await?;
    let claims = verified.into_identity_claims()?;

    if let Some(secondary_token) = request
        .google_id_token
        .as_deref()
        .filter(|t| !t.trim().is_empty())
    {
        corroborate_identity(secondary_token, &claims, &config, cache, http, clock).await?;
    }

    let account_id = account::find_or_create(store, &claims, clock).await?;

    let custom_token = signer
        .sign_session_token(&account_id, clock.now_secs() as i64)
        .await?;

    tracing::info!(account_id = %account_id, "login complete, session credential issued");

    Ok(LoginResponse { custom_token })
}

/// Verify a secondary provider's token and compare its asserted name with the
/// primary claim.
async fn corroborate_identity(
    secondary_token: &str,
    claims: &IdentityClaims,
    config: &Config,
    cache: &dyn Cache,
    http: &dyn HttpClient,
    clock: &dyn Clock,
) -> Result<()> {
    let Some(secondary) = &config.secondary else {
        tracing::warn!(
            "secondary identity token supplied but no secondary provider is configured; skipping corroboration"
        );
        return Ok(());
    };

    let discovery = oidc::fetch_discovery(&secondary.issuer_url, http).await?;
    let verified = oidc::verify_with_rotation_retry(
        secondary_token,
        &discovery,
        &secondary.client_id,
        &secondary.issuer_url,
        cache,
        http,
        clock,
    )
    .await?;

    let secondary_name = verified.name.as_deref().filter(|n| !n.is_empty()).ok_or_else(|| {
        ApiError::malformed_token("secondary identity token is missing the 'name' claim")
    })?;

    if names_match(secondary_name, &claims.full_name) {
        return Ok(());
    }

    match config.name_mismatch_policy {
        NameMismatchPolicy::Reject => Err(ApiError::identity_mismatch(
            "the two identity providers assert different names for this person",
        )),
        NameMismatchPolicy::WarnAndProceed => {
            tracing::warn!(
                national_id = %claims.national_id,
                "identity providers assert different names; proceeding per policy"
            );
            Ok(())
        }
    }
}

fn names_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}
