//! grant-admin: one-shot operator script
//!
//! Reads a single configured national identifier, grants the administrative
//! claim on the matching account, and prints a human-readable summary. Not
//! part of the request-serving surface; run it out of band with access to
//! the account database.

use kenni_bridge_core::admin;
use kenni_bridge_core::error::ApiError;
use kenni_bridge_server::store::{SqliteAccountStore, DEFAULT_DATABASE_PATH};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let national_id = match std::env::var("GRANT_ADMIN_NATIONAL_ID") {
        Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
        _ => {
            eprintln!("GRANT_ADMIN_NATIONAL_ID must be set to the national identifier to promote.");
            std::process::exit(2);
        }
    };

    let database_path =
        std::env::var("DATABASE_PATH").unwrap_or_else(|_| DEFAULT_DATABASE_PATH.into());

    let store = match SqliteAccountStore::open(&database_path).await {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open account store at '{}': {}", database_path, e);
            std::process::exit(1);
        }
    };

    println!("Granting administrative privileges to '{}'...", national_id);

    match admin::grant_admin(&store, &national_id).await {
        Ok(outcome) => {
            println!("--- SUCCESS ---");
            println!(
                "Account {} ({}) now has admin_flag={} and role='{}'.",
                outcome.account_id, outcome.display_name, outcome.admin_flag, outcome.role
            );
            println!("The grant takes effect on the account's next sign-in.");
        }
        Err(e) => {
            eprintln!("--- FAILURE ---");
            eprintln!("{}", e);
            if matches!(e, ApiError::PartialUpdate { .. }) {
                eprintln!("The two account representations are divergent; re-run this tool to repair.");
            }
            std::process::exit(1);
        }
    }
}
