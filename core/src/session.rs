//! Session credential issuance
//!
//! Mints the short-lived signed credential a client exchanges for a platform
//! session. The signer is constructed once at application startup and passed
//! by reference into the login flow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, Result};

/// Session credential lifetime; the platform rejects anything longer.
pub const SESSION_TOKEN_TTL_SECS: u64 = 3600;

/// Audience the platform's session-validation mechanism expects.
pub const SESSION_TOKEN_AUDIENCE: &str =
    "https://identitytoolkit.googleapis.com/google.identity.identitytoolkit.v1.IdentityToolkit";

/// Session credential claims
#[derive(Serialize, Deserialize)]
struct SessionClaims {
    iss: String,
    sub: String,
    aud: String,
    iat: i64,
    exp: i64,
    uid: String,
}

/// Signs session credentials for already-resolved account ids.
#[async_trait]
pub trait SessionSigner: Send + Sync {
    async fn sign_session_token(&self, account_id: &str, now_secs: i64) -> Result<String>;
}

/// Signer backed by a local PEM private key
pub struct PemSessionSigner {
    pub service_account: String,
    pub pem_key: String,
}

#[async_trait]
impl SessionSigner for PemSessionSigner {
    async fn sign_session_token(&self, account_id: &str, now_secs: i64) -> Result<String> {
        use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

        let claims = SessionClaims {
            iss: self.service_account.clone(),
            sub: self.service_account.clone(),
            aud: SESSION_TOKEN_AUDIENCE.to_string(),
            iat: now_secs,
            exp: now_secs + SESSION_TOKEN_TTL_SECS as i64,
            uid: account_id.to_string(),
        };

        let key = EncodingKey::from_rsa_pem(self.pem_key.as_bytes())
            .map_err(|e| ApiError::signing_unavailable(format!("session signing key unusable: {}", e)))?;

        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| ApiError::signing_unavailable(format!("failed to sign session token: {}", e)))
    }
}
