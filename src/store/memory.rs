//! In-memory account store

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use super::account::{AccountRecord, AccountStore, StoreError};
use crate::auth::CookieRecord;

/// Account map with the upsert/refresh rules shared by every store
#[derive(Debug, Clone, Default)]
pub(crate) struct AccountMap(pub(crate) BTreeMap<String, AccountRecord>);

impl AccountMap {
    pub(crate) fn upsert(&mut self, mut record: AccountRecord) -> AccountRecord {
        record.last_updated = Utc::now();
        self.0.insert(record.account_id.clone(), record.clone());
        record
    }

    pub(crate) fn refresh_cookies(&mut self, account_id: &str, cookies: Vec<CookieRecord>) -> bool {
        match self.0.get_mut(account_id) {
            Some(record) => {
                record.cookies = cookies;
                record.last_updated = Utc::now();
                true
            }
            None => false,
        }
    }

    pub(crate) fn delete(&mut self, account_id: &str) -> bool {
        self.0.remove(account_id).is_some()
    }
}

/// Account store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    accounts: Mutex<AccountMap>,
}

impl MemoryAccountStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn get(&self, account_id: &str) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self.accounts.lock().await.0.get(account_id).cloned())
    }

    async fn list(&self) -> Result<Vec<AccountRecord>, StoreError> {
        Ok(self.accounts.lock().await.0.values().cloned().collect())
    }

    async fn upsert(&self, record: AccountRecord) -> Result<AccountRecord, StoreError> {
        Ok(self.accounts.lock().await.upsert(record))
    }

    async fn delete(&self, account_id: &str) -> Result<bool, StoreError> {
        Ok(self.accounts.lock().await.delete(account_id))
    }

    async fn refresh_cookies(
        &self,
        account_id: &str,
        cookies: Vec<CookieRecord>,
    ) -> Result<bool, StoreError> {
        Ok(self.accounts.lock().await.refresh_cookies(account_id, cookies))
    }
}
