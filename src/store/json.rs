//! JSON-file account store
//!
//! All accounts live in one file under one well-known key:
//!
//! ```json
//! { "accounts": { "1001": { "accountId": "1001", "cookies": [...], ... } } }
//! ```
//!
//! The whole map is loaded on open and rewritten on every mutation. A
//! mutation is applied to a copy first and only becomes visible once the
//! file write succeeded, so memory and disk never diverge.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::account::{AccountRecord, AccountStore, StoreError};
use super::memory::AccountMap;
use crate::auth::CookieRecord;

/// On-disk representation of the store
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    accounts: BTreeMap<String, AccountRecord>,
}

/// Account store persisted to a JSON file
pub struct JsonAccountStore {
    path: PathBuf,
    accounts: Mutex<AccountMap>,
}

impl JsonAccountStore {
    /// Opens the store at `path`, starting empty if the file does not exist
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let accounts = load(&path).await?;
        tracing::debug!("Loaded {} accounts from {:?}", accounts.0.len(), path);

        Ok(Self {
            path,
            accounts: Mutex::new(accounts),
        })
    }

    /// Returns the path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `op` to a copy of the map, persists it, then commits it
    async fn mutate<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut AccountMap) -> (T, bool),
    {
        let mut guard = self.accounts.lock().await;
        let mut next = guard.clone();
        let (result, changed) = op(&mut next);

        if changed {
            persist(&self.path, &next).await?;
            *guard = next;
        }
        Ok(result)
    }
}

#[async_trait]
impl AccountStore for JsonAccountStore {
    async fn get(&self, account_id: &str) -> Result<Option<AccountRecord>, StoreError> {
        Ok(self.accounts.lock().await.0.get(account_id).cloned())
    }

    async fn list(&self) -> Result<Vec<AccountRecord>, StoreError> {
        Ok(self.accounts.lock().await.0.values().cloned().collect())
    }

    async fn upsert(&self, record: AccountRecord) -> Result<AccountRecord, StoreError> {
        self.mutate(|map| (map.upsert(record), true)).await
    }

    async fn delete(&self, account_id: &str) -> Result<bool, StoreError> {
        self.mutate(|map| {
            let deleted = map.delete(account_id);
            (deleted, deleted)
        })
        .await
    }

    async fn refresh_cookies(
        &self,
        account_id: &str,
        cookies: Vec<CookieRecord>,
    ) -> Result<bool, StoreError> {
        self.mutate(|map| {
            let refreshed = map.refresh_cookies(account_id, cookies);
            (refreshed, refreshed)
        })
        .await
    }
}

async fn load(path: &Path) -> Result<AccountMap, StoreError> {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(AccountMap::default()),
        Err(e) => return Err(e.into()),
    };

    let file: StoreFile = serde_json::from_slice(&content)?;
    let mut accounts = file.accounts;

    // Records written without an id take it from their key
    for (key, record) in accounts.iter_mut() {
        if record.account_id.is_empty() {
            record.account_id = key.clone();
        }
    }

    Ok(AccountMap(accounts))
}

async fn persist(path: &Path, accounts: &AccountMap) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let file = StoreFile {
        accounts: accounts.0.clone(),
    };
    let content = serde_json::to_vec_pretty(&file)?;

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, content).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityDocument;
    use tempfile::TempDir;

    fn record(id: &str, sessdata: &str) -> AccountRecord {
        AccountRecord::from_identity(
            IdentityDocument::new(id),
            vec![CookieRecord::new(".bilibili.com", "SESSDATA", sessdata)],
        )
    }

    #[tokio::test]
    async fn test_open_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = JsonAccountStore::open(dir.path().join("accounts.json"))
            .await
            .unwrap();

        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("accounts.json");

        {
            let store = JsonAccountStore::open(&path).await.unwrap();
            store.upsert(record("1001", "v1")).await.unwrap();
            store.upsert(record("2002", "v2")).await.unwrap();
            store.delete("2002").await.unwrap();
        }

        let store = JsonAccountStore::open(&path).await.unwrap();
        let accounts = store.list().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].cookie_value("SESSDATA"), Some("v1"));
    }

    #[tokio::test]
    async fn test_file_uses_accounts_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let store = JsonAccountStore::open(&path).await.unwrap();
        store.upsert(record("1001", "v1")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["accounts"]["1001"]["accountId"], "1001");
        assert_eq!(raw["accounts"]["1001"]["cookies"][0]["name"], "SESSDATA");
    }

    #[tokio::test]
    async fn test_reads_sparse_legacy_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(
            &path,
            r#"{"accounts": {"1001": {"displayName": "alice", "cookies": [{"domain": ".bilibili.com", "name": "SESSDATA", "value": "v1"}]}}}"#,
        )
        .unwrap();

        let store = JsonAccountStore::open(&path).await.unwrap();
        let record = store.get("1001").await.unwrap().unwrap();
        assert_eq!(record.account_id, "1001");
        assert_eq!(record.display_name, "alice");
        assert_eq!(record.cookies[0].path, "/");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = JsonAccountStore::open(&path).await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn test_noop_mutations_do_not_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");
        let store = JsonAccountStore::open(&path).await.unwrap();

        assert!(!store.delete("missing").await.unwrap());
        assert!(!store.refresh_cookies("missing", vec![]).await.unwrap());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        // A directory where the file should be makes every write fail
        let path = dir.path().join("accounts.json");
        std::fs::create_dir(&path).unwrap();
        let store = JsonAccountStore {
            path: path.clone(),
            accounts: Mutex::new(AccountMap::default()),
        };

        assert!(store.upsert(record("1001", "v1")).await.is_err());
        assert!(store.get("1001").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_upserts_keep_one_entry() {
        let dir = TempDir::new().unwrap();
        let store = std::sync::Arc::new(
            JsonAccountStore::open(dir.path().join("accounts.json"))
                .await
                .unwrap(),
        );

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.upsert(record("1001", &format!("v{}", i))).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let accounts = store.list().await.unwrap();
        assert_eq!(accounts.len(), 1);

        // Whichever write landed last is what the file holds
        let reopened = JsonAccountStore::open(store.path()).await.unwrap();
        let on_disk = reopened.get("1001").await.unwrap().unwrap();
        assert_eq!(on_disk.cookies, accounts[0].cookies);
    }
}
