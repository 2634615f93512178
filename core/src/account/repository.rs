//! Account repository operations
//!
//! Idempotent provisioning keyed by national identifier, contact-field
//! updates, and the dual-representation admin claim.

use crate::account::{
    Account, AccountStore, InsertOutcome, ProfileRecord, ProfileUpdate, ROLE_ADMIN, ROLE_USER,
};
use crate::error::{ApiError, Result};
use crate::oidc::IdentityClaims;
use crate::platform::Clock;

/// Look up the account for a verified identity, creating the Account/Profile
/// pair on first contact. Concurrent first logins for one national identifier
/// resolve to a single record: the conditional insert decides the winner and
/// the loser re-reads the winner's row.
pub async fn find_or_create(
    store: &dyn AccountStore,
    claims: &IdentityClaims,
    clock: &dyn Clock,
) -> Result<String> {
    let now = clock.now_secs() as i64;

    if let Some(existing) = store.get_account(&claims.national_id).await? {
        store.touch_last_login(&existing.account_id, now).await?;
        return Ok(existing.account_id);
    }

    let account = Account {
        account_id: claims.national_id.clone(),
        display_name: claims.full_name.clone(),
        admin_flag: false,
    };
    let profile = ProfileRecord {
        account_id: claims.national_id.clone(),
        full_name: claims.full_name.clone(),
        email: None,
        photo_url: None,
        role: ROLE_USER.to_string(),
        created_at: now,
        last_login_at: now,
    };

    match store.insert_account(&account, &profile).await? {
        InsertOutcome::Created => {
            tracing::info!(account_id = %account.account_id, "provisioned new account");
            Ok(account.account_id)
        }
        InsertOutcome::AlreadyExists => {
            // Lost the creation race; the winner's record is authoritative.
            let existing = store.get_account(&claims.national_id).await?.ok_or_else(|| {
                ApiError::repository(format!(
                    "account '{}' missing after insert conflict",
                    claims.national_id
                ))
            })?;
            store.touch_last_login(&existing.account_id, now).await?;
            Ok(existing.account_id)
        }
    }
}

/// Partial update of mutable contact fields.
pub async fn update_profile(
    store: &dyn AccountStore,
    account_id: &str,
    fields: &ProfileUpdate,
) -> Result<()> {
    if store.get_account(account_id).await?.is_none() {
        return Err(ApiError::not_found(format!("no account '{}'", account_id)));
    }

    store.update_profile_fields(account_id, fields).await
}

/// Set the admin flag and mirror the profile role.
///
/// The two writes are not transactional; a failure after the first write, or
/// divergent values on re-read, is reported as a partial update so an
/// operator can repair the drift (re-running the operation is the repair).
pub async fn set_admin_claim(
    store: &dyn AccountStore,
    account_id: &str,
    is_admin: bool,
) -> Result<()> {
    if store.get_account(account_id).await?.is_none() {
        return Err(ApiError::not_found(format!("no account '{}'", account_id)));
    }

    store.set_admin_flag(account_id, is_admin).await?;

    let role = if is_admin { ROLE_ADMIN } else { ROLE_USER };
    if let Err(e) = store.set_profile_role(account_id, role).await {
        return Err(ApiError::partial_update(format!(
            "admin flag updated for '{}' but the profile role write failed ({}); re-run to repair",
            account_id, e
        )));
    }

    // Reconciliation check: both representations must agree before success is
    // reported.
    let account = store
        .get_account(account_id)
        .await?
        .ok_or_else(|| ApiError::repository(format!("account '{}' disappeared", account_id)))?;
    let profile = store.get_profile(account_id).await?.ok_or_else(|| {
        ApiError::partial_update(format!(
            "admin flag updated for '{}' but no profile record exists",
            account_id
        ))
    })?;

    if account.admin_flag != is_admin || profile.role != role {
        return Err(ApiError::partial_update(format!(
            "representations diverged for '{}': admin_flag={}, role='{}'",
            account_id, account.admin_flag, profile.role
        )));
    }

    Ok(())
}
