//! OIDC (OpenID Connect) module
//!
//! Discovery, JWKS resolution and identity-token verification.

mod discovery;
mod jwks;
mod verify;

pub use discovery::{fetch_discovery, DiscoveryDocument};
pub use jwks::{resolve, resolve_fresh, KeySource};
pub use verify::{
    verify_id_token, verify_with_rotation_retry, IdentityClaims, VerifiedToken,
};
