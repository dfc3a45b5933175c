//! Account records and the store trait

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::CookieRecord;
use crate::identity::IdentityDocument;

/// Errors that can occur while reading or writing the account store
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error on the backing file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stored data could not be (de)serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A captured account: identity metadata plus its full cookie set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    /// Stable external identity key
    #[serde(default)]
    pub account_id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: String,
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub vip_status: i64,
    /// Cookies captured for this account, in capture order
    #[serde(default)]
    pub cookies: Vec<CookieRecord>,
    /// When the record was last written
    #[serde(default, with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
}

impl AccountRecord {
    /// Builds a record from a resolved identity and a cookie snapshot
    pub fn from_identity(identity: IdentityDocument, cookies: Vec<CookieRecord>) -> Self {
        Self {
            account_id: identity.account_id,
            display_name: identity.display_name,
            avatar_url: identity.avatar_url,
            level: identity.level,
            balance: identity.balance,
            vip_status: identity.vip_status,
            cookies,
            last_updated: Utc::now(),
        }
    }

    /// Returns the value of the captured cookie named `name`
    pub fn cookie_value(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.as_str())
    }
}

/// Durable mapping of account id to [`AccountRecord`]
///
/// Keys are unique. Writes on the same key are serialized; the last write
/// wins and individual cookies are never merged.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Gets one account
    async fn get(&self, account_id: &str) -> Result<Option<AccountRecord>, StoreError>;

    /// Lists all accounts in no particular order
    async fn list(&self) -> Result<Vec<AccountRecord>, StoreError>;

    /// Inserts or replaces the record under its account id
    ///
    /// Sets `last_updated` to now and returns the stored record.
    async fn upsert(&self, record: AccountRecord) -> Result<AccountRecord, StoreError>;

    /// Deletes an account; returns `false` if it was not stored
    async fn delete(&self, account_id: &str) -> Result<bool, StoreError>;

    /// Replaces the cookies of an existing account and bumps `last_updated`
    ///
    /// Returns `false` (and stores nothing) if the account is not stored.
    async fn refresh_cookies(
        &self,
        account_id: &str,
        cookies: Vec<CookieRecord>,
    ) -> Result<bool, StoreError>;
}
