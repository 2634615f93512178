//! SQLite implementation of the account store
//!
//! Accounts and profiles live in separate tables to preserve the
//! dual-representation shape of the admin claim; elections are the one piece
//! of non-identity state the RPC surface writes.

use std::path::Path;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension as _};

use kenni_bridge_core::account::{
    Account, AccountStore, InsertOutcome, ProfileRecord, ProfileUpdate,
};
use kenni_bridge_core::error::{ApiError, Result};

pub const DEFAULT_DATABASE_PATH: &str = "kenni-bridge.db";

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS accounts (
    account_id   TEXT PRIMARY KEY,   -- national identifier
    display_name TEXT NOT NULL,
    is_admin     INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS profiles (
    account_id    TEXT PRIMARY KEY REFERENCES accounts(account_id),
    full_name     TEXT NOT NULL,
    email         TEXT,
    photo_url     TEXT,
    role          TEXT NOT NULL DEFAULT 'user',
    created_at    INTEGER NOT NULL,  -- unix seconds
    last_login_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS elections (
    election_id TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    description TEXT NOT NULL,
    start_date  TEXT NOT NULL,       -- ISO 8601
    end_date    TEXT NOT NULL,
    created_by  TEXT NOT NULL REFERENCES accounts(account_id),
    created_at  INTEGER NOT NULL
);
";

/// An election row as written by the create-election RPC
#[derive(Debug, Clone)]
pub struct ElectionRecord {
    pub election_id: String,
    pub name: String,
    pub description: String,
    pub start_date: String,
    pub end_date: String,
    pub created_by: String,
    pub created_at: i64,
}

/// Account store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection handle is reference-counted and
/// serializes all statements, which is what makes the conditional insert
/// race-free.
#[derive(Clone)]
pub struct SqliteAccountStore {
    conn: tokio_rusqlite::Connection,
}

fn repo_err(e: tokio_rusqlite::Error) -> ApiError {
    ApiError::repository(e.to_string())
}

impl SqliteAccountStore {
    /// Open (or create) a store at `path` and run schema initialisation.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(repo_err)?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory store — useful for testing.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(repo_err)?;
        let store = Self { conn };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await
            .map_err(repo_err)
    }

    pub async fn insert_election(&self, election: &ElectionRecord) -> Result<()> {
        let election = election.clone();
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO elections
                     (election_id, name, description, start_date, end_date, created_by, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        election.election_id,
                        election.name,
                        election.description,
                        election.start_date,
                        election.end_date,
                        election.created_by,
                        election.created_at,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(repo_err)
    }

    pub async fn get_election(&self, election_id: &str) -> Result<Option<ElectionRecord>> {
        let election_id = election_id.to_string();
        self.conn
            .call(move |conn| {
                let record = conn
                    .query_row(
                        "SELECT election_id, name, description, start_date, end_date,
                                created_by, created_at
                         FROM elections WHERE election_id = ?1",
                        params![election_id],
                        |row| {
                            Ok(ElectionRecord {
                                election_id: row.get(0)?,
                                name: row.get(1)?,
                                description: row.get(2)?,
                                start_date: row.get(3)?,
                                end_date: row.get(4)?,
                                created_by: row.get(5)?,
                                created_at: row.get(6)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(record)
            })
            .await
            .map_err(repo_err)
    }
}

#[async_trait]
impl AccountStore for SqliteAccountStore {
    async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        let account_id = account_id.to_string();
        self.conn
            .call(move |conn| {
                let account = conn
                    .query_row(
                        "SELECT account_id, display_name, is_admin
                         FROM accounts WHERE account_id = ?1",
                        params![account_id],
                        |row| {
                            Ok(Account {
                                account_id: row.get(0)?,
                                display_name: row.get(1)?,
                                admin_flag: row.get(2)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(account)
            })
            .await
            .map_err(repo_err)
    }

    async fn get_profile(&self, account_id: &str) -> Result<Option<ProfileRecord>> {
        let account_id = account_id.to_string();
        self.conn
            .call(move |conn| {
                let profile = conn
                    .query_row(
                        "SELECT account_id, full_name, email, photo_url, role,
                                created_at, last_login_at
                         FROM profiles WHERE account_id = ?1",
                        params![account_id],
                        |row| {
                            Ok(ProfileRecord {
                                account_id: row.get(0)?,
                                full_name: row.get(1)?,
                                email: row.get(2)?,
                                photo_url: row.get(3)?,
                                role: row.get(4)?,
                                created_at: row.get(5)?,
                                last_login_at: row.get(6)?,
                            })
                        },
                    )
                    .optional()?;
                Ok(profile)
            })
            .await
            .map_err(repo_err)
    }

    async fn insert_account(
        &self,
        account: &Account,
        profile: &ProfileRecord,
    ) -> Result<InsertOutcome> {
        let account = account.clone();
        let profile = profile.clone();
        self.conn
            .call(move |conn| {
                let tx = conn.transaction()?;

                // The primary key on account_id is the uniqueness guarantee;
                // a losing racer observes zero inserted rows.
                let inserted = tx.execute(
                    "INSERT INTO accounts (account_id, display_name, is_admin)
                     VALUES (?1, ?2, ?3)
                     ON CONFLICT(account_id) DO NOTHING",
                    params![account.account_id, account.display_name, account.admin_flag],
                )?;

                if inserted == 0 {
                    tx.commit()?;
                    return Ok(InsertOutcome::AlreadyExists);
                }

                tx.execute(
                    "INSERT INTO profiles
                     (account_id, full_name, email, photo_url, role, created_at, last_login_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        profile.account_id,
                        profile.full_name,
                        profile.email,
                        profile.photo_url,
                        profile.role,
                        profile.created_at,
                        profile.last_login_at,
                    ],
                )?;

                tx.commit()?;
                Ok(InsertOutcome::Created)
            })
            .await
            .map_err(repo_err)
    }

    async fn set_admin_flag(&self, account_id: &str, is_admin: bool) -> Result<()> {
        let id = account_id.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE accounts SET is_admin = ?2 WHERE account_id = ?1",
                    params![id, is_admin],
                )?;
                Ok(changed)
            })
            .await
            .map_err(repo_err)?;

        if changed == 0 {
            return Err(ApiError::repository(format!("no account '{}'", account_id)));
        }
        Ok(())
    }

    async fn set_profile_role(&self, account_id: &str, role: &str) -> Result<()> {
        let id = account_id.to_string();
        let role = role.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE profiles SET role = ?2 WHERE account_id = ?1",
                    params![id, role],
                )?;
                Ok(changed)
            })
            .await
            .map_err(repo_err)?;

        if changed == 0 {
            return Err(ApiError::repository(format!("no profile '{}'", account_id)));
        }
        Ok(())
    }

    async fn update_profile_fields(
        &self,
        account_id: &str,
        fields: &ProfileUpdate,
    ) -> Result<()> {
        let id = account_id.to_string();
        let email = fields.email.clone();
        let photo_url = fields.photo_url.clone();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE profiles
                     SET email = COALESCE(?2, email),
                         photo_url = COALESCE(?3, photo_url)
                     WHERE account_id = ?1",
                    params![id, email, photo_url],
                )?;
                Ok(changed)
            })
            .await
            .map_err(repo_err)?;

        if changed == 0 {
            return Err(ApiError::repository(format!("no profile '{}'", account_id)));
        }
        Ok(())
    }

    async fn touch_last_login(&self, account_id: &str, now_secs: i64) -> Result<()> {
        let id = account_id.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    "UPDATE profiles SET last_login_at = ?2 WHERE account_id = ?1",
                    params![id, now_secs],
                )?;
                Ok(changed)
            })
            .await
            .map_err(repo_err)?;

        if changed == 0 {
            return Err(ApiError::repository(format!("no profile '{}'", account_id)));
        }
        Ok(())
    }
}
