//! Account model and durable-store abstraction
//!
//! An [`Account`] is the authentication-side record of one citizen; its
//! [`ProfileRecord`] mirrors selected fields into the durable profile store.
//! The two representations are kept consistent by
//! [`repository::set_admin_claim`], not by a transaction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

mod repository;

pub use repository::{find_or_create, set_admin_claim, update_profile};

pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_USER: &str = "user";

/// One citizen's identity within the system. The account id equals the
/// national identifier and never changes once assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub account_id: String,
    pub display_name: String,
    pub admin_flag: bool,
}

/// Durable-store mirror of an account plus contact metadata.
///
/// Invariant (checked, not enforced transactionally):
/// `role == "admin"` exactly when the account's `admin_flag` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub account_id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub photo_url: Option<String>,
    pub role: String,
    pub created_at: i64,
    pub last_login_at: i64,
}

/// Partial update of mutable contact fields; never touches the admin flag.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

/// Outcome of a conditional account insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    AlreadyExists,
}

/// Abstraction over the account/profile store backend.
///
/// `insert_account` must be atomic: when two callers race to create the same
/// account id, the backend's uniqueness guarantee decides a single winner and
/// the loser observes `AlreadyExists`. Backends must never implement it as an
/// unprotected read-then-write.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>>;

    async fn get_profile(&self, account_id: &str) -> Result<Option<ProfileRecord>>;

    /// Insert the Account/Profile pair if (and only if) the account id is
    /// unseen.
    async fn insert_account(
        &self,
        account: &Account,
        profile: &ProfileRecord,
    ) -> Result<InsertOutcome>;

    async fn set_admin_flag(&self, account_id: &str, is_admin: bool) -> Result<()>;

    async fn set_profile_role(&self, account_id: &str, role: &str) -> Result<()>;

    async fn update_profile_fields(
        &self,
        account_id: &str,
        fields: &ProfileUpdate,
    ) -> Result<()>;

    async fn touch_last_login(&self, account_id: &str, now_secs: i64) -> Result<()>;
}
