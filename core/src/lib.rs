//! kenni-bridge-core: platform-agnostic core of the Kenni federation bridge
//!
//! This crate contains all protocol and business logic for the federated
//! login flow: authorization-code + PKCE exchange, OIDC discovery and JWKS
//! resolution, identity-token verification, idempotent account provisioning,
//! session-credential issuance, and the operator-invoked privilege grant.
//! It depends only on abstract platform traits (Cache, HttpClient, Clock,
//! Environment, AccountStore, SessionSigner) and never imports
//! platform-specific code.

pub mod account;
pub mod admin;
pub mod config;
pub mod error;
pub mod kenni;
pub mod login;
pub mod oidc;
pub mod platform;
pub mod session;

#[cfg(test)]
pub mod test_support;
