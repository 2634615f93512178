//! Identity token verification
//!
//! Signature and claim checks are a pure function over an injected
//! [`KeySource`]; only [`verify_with_rotation_retry`] touches the network,
//! and only through the JWKS resolver.

use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::config::CLOCK_SKEW_LEEWAY_SECS;
use crate::error::{ApiError, Result};
use crate::oidc::discovery::DiscoveryDocument;
use crate::oidc::jwks::{self, KeySource};
use crate::platform::{Cache, Clock, HttpClient};

/// Claims asserted by a verified identity token
#[derive(Debug, Clone, Deserialize)]
struct RawClaims {
    iss: String,
    #[serde(deserialize_with = "deserialize_audience")]
    aud: Vec<String>,
    exp: u64,
    iat: u64,
    #[serde(default)]
    nbf: Option<u64>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    national_id: Option<String>,
}

/// A token that passed signature, issuer, audience and time checks.
///
/// Which claims are additionally required depends on the caller: the primary
/// login flow needs a national identifier, corroboration only needs a name.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub issuer: String,
    pub audience: Vec<String>,
    pub expires_at: u64,
    pub name: Option<String>,
    pub national_id: Option<String>,
}

/// Identity asserted by the primary provider, consumed once per login attempt
#[derive(Debug, Clone)]
pub struct IdentityClaims {
    pub national_id: String,
    pub full_name: String,
}

impl VerifiedToken {
    /// Enforce the claims account provisioning needs. Missing either one is a
    /// malformed token even though the signature verified.
    pub fn into_identity_claims(self) -> Result<IdentityClaims> {
        let national_id = self
            .national_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::malformed_token("identity token is missing the 'national_id' claim"))?;
        let full_name = self
            .name
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ApiError::malformed_token("identity token is missing the 'name' claim"))?;

        Ok(IdentityClaims {
            national_id,
            full_name,
        })
    }
}

/// Deserialize audience as either string or array
fn deserialize_audience<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};

    struct AudienceVisitor;

    impl<'de> Visitor<'de> for AudienceVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("string or array of strings")
        }

        fn visit_str<E>(self, value: &str) -> std::result::Result<Vec<String>, E>
        where
            E: de::Error,
        {
            Ok(vec![value.to_string()])
        }

        fn visit_seq<A>(self, mut seq: A) -> std::result::Result<Vec<String>, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut values = Vec::new();
            while let Some(value) = seq.next_element()? {
                values.push(value);
            }
            Ok(values)
        }
    }

    deserializer.deserialize_any(AudienceVisitor)
}

/// Verify an identity token against an already-resolved key set.
pub fn verify_id_token(
    token: &str,
    keys: &KeySource,
    expected_audience: &str,
    expected_issuer: &str,
    clock: &dyn Clock,
) -> Result<VerifiedToken> {
    let header = decode_header(token)
        .map_err(|e| ApiError::malformed_token(format!("invalid JWT header: {}", e)))?;

    let kid = header
        .kid
        .as_deref()
        .ok_or_else(|| ApiError::malformed_token("JWT missing 'kid' header"))?;

    let jwk = keys.find(kid).ok_or_else(|| {
        ApiError::invalid_signature(format!("key '{}' not found in provider key set", kid))
    })?;

    // The declared key algorithm must match the token header exactly; a token
    // claiming any other scheme (notably a symmetric one) is rejected before
    // its key material is touched.
    let algorithm = declared_algorithm(jwk)?;
    if header.alg != algorithm {
        return Err(ApiError::invalid_signature(format!(
            "token algorithm {:?} does not match the provider key's {:?}",
            header.alg, algorithm
        )));
    }

    let decoding_key = DecodingKey::from_jwk(jwk)
        .map_err(|e| ApiError::invalid_signature(format!("unusable JWK: {}", e)))?;

    // Time and identity claims are validated manually below, against the
    // injected clock, so the library only checks the signature here.
    let mut validation = Validation::new(algorithm);
    validation.validate_exp = false;
    validation.validate_nbf = false;
    validation.validate_aud = false;
    validation.set_required_spec_claims::<&str>(&[]);

    let token_data =
        decode::<RawClaims>(token, &decoding_key, &validation).map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                ApiError::invalid_signature("token signature does not match the provider key")
            }
            jsonwebtoken::errors::ErrorKind::Base64(_)
            | jsonwebtoken::errors::ErrorKind::Json(_)
            | jsonwebtoken::errors::ErrorKind::Utf8(_)
            | jsonwebtoken::errors::ErrorKind::InvalidToken => {
                ApiError::malformed_token(format!("undecodable token: {}", e))
            }
            _ => ApiError::invalid_signature(format!("token verification failed: {}", e)),
        })?;
    let claims = token_data.claims;

    if !claims.aud.iter().any(|aud| aud == expected_audience) {
        return Err(ApiError::audience_mismatch(format!(
            "token audience {:?} does not include '{}'",
            claims.aud, expected_audience
        )));
    }

    if claims.iss != expected_issuer && claims.iss != expected_issuer.trim_end_matches('/') {
        return Err(ApiError::issuer_mismatch(format!(
            "token issued by '{}', expected '{}'",
            claims.iss, expected_issuer
        )));
    }

    let now_secs = clock.now_secs();

    if now_secs >= claims.exp {
        return Err(ApiError::ExpiredToken);
    }

    if claims.iat > now_secs + CLOCK_SKEW_LEEWAY_SECS {
        return Err(ApiError::malformed_token("token issued in the future (iat claim)"));
    }

    if let Some(nbf) = claims.nbf {
        if nbf > now_secs + CLOCK_SKEW_LEEWAY_SECS {
            return Err(ApiError::malformed_token("token is not yet valid (nbf claim)"));
        }
    }

    if claims.iat >= claims.exp {
        return Err(ApiError::malformed_token("invalid token lifetime: iat >= exp"));
    }

    Ok(VerifiedToken {
        issuer: claims.iss,
        audience: claims.aud,
        expires_at: claims.exp,
        name: claims.name,
        national_id: claims.national_id,
    })
}

/// Resolve the key set for `discovery` and verify `token` against it,
/// allowing exactly one fresh re-fetch when a cached key set fails in a way
/// key rotation would explain.
pub async fn verify_with_rotation_retry(
    token: &str,
    discovery: &DiscoveryDocument,
    expected_audience: &str,
    expected_issuer: &str,
    cache: &dyn Cache,
    http: &dyn HttpClient,
    clock: &dyn Clock,
) -> Result<VerifiedToken> {
    let keys = jwks::resolve(discovery, cache, http).await?;

    match verify_id_token(token, &keys, expected_audience, expected_issuer, clock) {
        Err(err) if keys.from_cache && could_be_key_rotation(&err) => {
            tracing::info!(
                issuer = %discovery.issuer,
                error = %err,
                "cached key set failed verification, refreshing once"
            );
            let fresh = jwks::resolve_fresh(discovery, cache, http).await?;
            verify_id_token(token, &fresh, expected_audience, expected_issuer, clock)
        }
        other => other,
    }
}

fn could_be_key_rotation(err: &ApiError) -> bool {
    matches!(err, ApiError::InvalidSignature { .. })
}

fn declared_algorithm(jwk: &Jwk) -> Result<Algorithm> {
    if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
        return Err(ApiError::invalid_signature(
            "provider key is not an RSA signing key",
        ));
    }

    match jwk.common.key_algorithm {
        Some(KeyAlgorithm::RS256) | None => Ok(Algorithm::RS256),
        Some(KeyAlgorithm::RS384) => Ok(Algorithm::RS384),
        Some(KeyAlgorithm::RS512) => Ok(Algorithm::RS512),
        Some(other) => Err(ApiError::invalid_signature(format!(
            "unsupported key algorithm '{}'",
            other
        ))),
    }
}
