//! Privileged RPC operations
//!
//! Called by an already-authenticated client; the platform auth layer in
//! front of this service injects the caller's account id, so these handlers
//! only check the admin flag and validate input. Everything fails before any
//! write.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kenni_bridge_core::account::{self, AccountStore, ProfileUpdate};
use kenni_bridge_core::error::{ApiError, Result};
use kenni_bridge_core::platform::Clock;

use crate::store::{ElectionRecord, SqliteAccountStore};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateElectionRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start_date: String,
    #[serde(default)]
    pub end_date: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateElectionResponse {
    pub status: &'static str,
    pub election_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub email: String,
    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    pub status: &'static str,
    pub message: String,
}

/// Create an election record. Requires the caller's admin flag.
pub async fn create_election(
    caller: &str,
    request: CreateElectionRequest,
    store: &SqliteAccountStore,
    clock: &dyn Clock,
) -> Result<CreateElectionResponse> {
    for (field, value) in [
        ("name", &request.name),
        ("description", &request.description),
        ("startDate", &request.start_date),
        ("endDate", &request.end_date),
    ] {
        if value.trim().is_empty() {
            return Err(ApiError::invalid_request(format!("'{}' is required", field)));
        }
    }

    let start = chrono::DateTime::parse_from_rfc3339(&request.start_date)
        .map_err(|_| ApiError::invalid_request("'startDate' must be an ISO-8601 timestamp"))?;
    let end = chrono::DateTime::parse_from_rfc3339(&request.end_date)
        .map_err(|_| ApiError::invalid_request("'endDate' must be an ISO-8601 timestamp"))?;
    if end <= start {
        return Err(ApiError::invalid_request("'endDate' must be after 'startDate'"));
    }

    let caller_account = store
        .get_account(caller)
        .await?
        .ok_or_else(|| ApiError::permission_denied("caller account not found"))?;
    if !caller_account.admin_flag {
        return Err(ApiError::permission_denied(
            "creating elections requires administrator privileges",
        ));
    }

    let record = ElectionRecord {
        election_id: Uuid::new_v4().to_string(),
        name: request.name,
        description: request.description,
        start_date: request.start_date,
        end_date: request.end_date,
        created_by: caller_account.account_id,
        created_at: clock.now_secs() as i64,
    };
    store.insert_election(&record).await?;

    Ok(CreateElectionResponse {
        status: "success",
        election_id: record.election_id,
    })
}

/// Update the caller's own contact fields. `email` is mandatory.
pub async fn update_profile(
    caller: &str,
    request: UpdateProfileRequest,
    store: &SqliteAccountStore,
) -> Result<UpdateProfileResponse> {
    if request.email.trim().is_empty() {
        return Err(ApiError::invalid_request("'email' is required"));
    }

    let fields = ProfileUpdate {
        email: Some(request.email),
        photo_url: request.photo_url,
    };
    account::update_profile(store, caller, &fields).await?;

    Ok(UpdateProfileResponse {
        status: "success",
        message: "profile updated".to_string(),
    })
}
