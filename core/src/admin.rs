//! Privilege assignment
//!
//! Operator-invoked, out-of-band grant of the administrative claim. Performs
//! no token verification; trust comes from how the operator tooling is
//! deployed, not from this routine.

use crate::account::{self, AccountStore, ROLE_ADMIN};
use crate::error::{ApiError, Result};

/// What the operator sees after a successful grant
#[derive(Debug)]
pub struct GrantOutcome {
    pub account_id: String,
    pub display_name: String,
    pub admin_flag: bool,
    pub role: String,
}

/// Grant the administrative claim to the account matching `identifier`.
///
/// Account ids equal national identifiers, so a single lookup resolves
/// either form. Both representations are re-read after the grant; success is
/// only reported once they agree.
pub async fn grant_admin(store: &dyn AccountStore, identifier: &str) -> Result<GrantOutcome> {
    let account = store.get_account(identifier).await?.ok_or_else(|| {
        ApiError::not_found(format!("no account found for identifier '{}'", identifier))
    })?;

    account::set_admin_claim(store, &account.account_id, true).await?;

    let account = store
        .get_account(&account.account_id)
        .await?
        .ok_or_else(|| ApiError::repository("account disappeared during grant"))?;
    let profile = store
        .get_profile(&account.account_id)
        .await?
        .ok_or_else(|| ApiError::partial_update("grant applied but no profile record exists"))?;

    if !account.admin_flag || profile.role != ROLE_ADMIN {
        return Err(ApiError::partial_update(format!(
            "grant did not converge for '{}': admin_flag={}, role='{}'",
            account.account_id, account.admin_flag, profile.role
        )));
    }

    Ok(GrantOutcome {
        account_id: account.account_id,
        display_name: account.display_name,
        admin_flag: account.admin_flag,
        role: profile.role,
    })
}
