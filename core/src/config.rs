//! Configuration and secrets management

use crate::error::{ApiError, Result};
use crate::platform::Environment;

/// Identifying header sent on every outbound request; the identity provider
/// rejects clients presenting a default user agent.
pub const OUTBOUND_USER_AGENT: &str = concat!("kenni-bridge/", env!("CARGO_PKG_VERSION"));

/// Cache TTL for JWKS documents (1 hour)
pub const JWKS_CACHE_TTL_SECS: u64 = 3600;

/// Tolerated clock skew when checking `iat`/`nbf` claims
pub const CLOCK_SKEW_LEEWAY_SECS: u64 = 60;

/// Issuer used for secondary-provider corroboration unless overridden
pub const DEFAULT_SECONDARY_ISSUER: &str = "https://accounts.google.com";

/// OIDC provider used for the authorization-code + PKCE exchange
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Secondary provider whose identity token corroborates the primary claim
#[derive(Clone, Debug)]
pub struct SecondaryProviderConfig {
    pub issuer_url: String,
    pub client_id: String,
}

/// What to do when the two providers assert different names for one person.
///
/// The historical behavior is to log and proceed; whether that is acceptable
/// is a question for the system owner, so it is configuration rather than a
/// hard-coded policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameMismatchPolicy {
    WarnAndProceed,
    Reject,
}

/// Application configuration loaded from platform environment
#[derive(Debug)]
pub struct Config {
    pub kenni: ProviderConfig,
    pub secondary: Option<SecondaryProviderConfig>,
    /// Service account identity asserted as issuer/subject of session credentials
    pub session_service_account: String,
    pub name_mismatch_policy: NameMismatchPolicy,
}

impl Config {
    /// Load configuration from platform environment
    pub fn from_env(env: &dyn Environment) -> Result<Self> {
        let kenni = ProviderConfig {
            issuer_url: env
                .get_var("KENNI_ISSUER_URL")
                .map_err(|_| ApiError::configuration("KENNI_ISSUER_URL not configured"))?,
            client_id: env
                .get_var("KENNI_CLIENT_ID")
                .map_err(|_| ApiError::configuration("KENNI_CLIENT_ID not configured"))?,
            client_secret: env
                .get_secret("KENNI_CLIENT_SECRET")
                .map_err(|_| ApiError::configuration("KENNI_CLIENT_SECRET secret not set"))?,
            redirect_uri: env
                .get_var("KENNI_REDIRECT_URI")
                .map_err(|_| ApiError::configuration("KENNI_REDIRECT_URI not configured"))?,
        };

        // Corroboration is active only when a secondary client id is deployed.
        let secondary = match env.get_var("GOOGLE_CLIENT_ID") {
            Ok(client_id) => Some(SecondaryProviderConfig {
                issuer_url: env
                    .get_var("GOOGLE_ISSUER_URL")
                    .unwrap_or_else(|_| DEFAULT_SECONDARY_ISSUER.to_string()),
                client_id,
            }),
            Err(_) => None,
        };

        let name_mismatch_policy = match env.get_var("NAME_MISMATCH_POLICY") {
            Ok(value) => parse_name_mismatch_policy(&value)?,
            Err(_) => NameMismatchPolicy::WarnAndProceed,
        };

        Ok(Self {
            kenni,
            secondary,
            session_service_account: env
                .get_var("SESSION_SERVICE_ACCOUNT")
                .map_err(|_| ApiError::configuration("SESSION_SERVICE_ACCOUNT not configured"))?,
            name_mismatch_policy,
        })
    }
}

fn parse_name_mismatch_policy(value: &str) -> Result<NameMismatchPolicy> {
    match value {
        "reject" => Ok(NameMismatchPolicy::Reject),
        "warn_and_proceed" | "warn" => Ok(NameMismatchPolicy::WarnAndProceed),
        other => Err(ApiError::configuration(format!(
            "unrecognized NAME_MISMATCH_POLICY '{}': expected 'reject' or 'warn_and_proceed'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockEnv;

    fn full_env() -> MockEnv {
        MockEnv::new()
            .with_var("KENNI_ISSUER_URL", "https://idp.example/oidc")
            .with_var("KENNI_CLIENT_ID", "client-abc")
            .with_var("KENNI_REDIRECT_URI", "https://app.example/auth/callback")
            .with_var("SESSION_SERVICE_ACCOUNT", "bridge@platform.example")
            .with_secret("KENNI_CLIENT_SECRET", "s3cret")
    }

    #[test]
    fn loads_complete_configuration() {
        let config = Config::from_env(&full_env()).expect("config should load");
        assert_eq!(config.kenni.issuer_url, "https://idp.example/oidc");
        assert_eq!(config.kenni.client_id, "client-abc");
        assert!(config.secondary.is_none());
        assert_eq!(config.name_mismatch_policy, NameMismatchPolicy::WarnAndProceed);
    }

    #[test]
    fn missing_client_secret_is_a_configuration_error() {
        let env = MockEnv::new()
            .with_var("KENNI_ISSUER_URL", "https://idp.example/oidc")
            .with_var("KENNI_CLIENT_ID", "client-abc")
            .with_var("KENNI_REDIRECT_URI", "https://app.example/auth/callback")
            .with_var("SESSION_SERVICE_ACCOUNT", "bridge@platform.example");

        let err = Config::from_env(&env).unwrap_err();
        assert_eq!(err.error_key(), "configuration_error");
    }

    #[test]
    fn secondary_provider_defaults_its_issuer() {
        let env = full_env().with_var("GOOGLE_CLIENT_ID", "google-abc");
        let config = Config::from_env(&env).expect("config should load");
        let secondary = config.secondary.expect("secondary should be configured");
        assert_eq!(secondary.issuer_url, DEFAULT_SECONDARY_ISSUER);
        assert_eq!(secondary.client_id, "google-abc");
    }

    #[test]
    fn name_mismatch_policy_parses_reject() {
        let env = full_env().with_var("NAME_MISMATCH_POLICY", "reject");
        let config = Config::from_env(&env).expect("config should load");
        assert_eq!(config.name_mismatch_policy, NameMismatchPolicy::Reject);
    }

    #[test]
    fn unknown_name_mismatch_policy_is_rejected() {
        let env = full_env().with_var("NAME_MISMATCH_POLICY", "ignore");
        let err = Config::from_env(&env).unwrap_err();
        assert_eq!(err.error_key(), "configuration_error");
    }
}
