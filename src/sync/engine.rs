//! Session synchronization engine
//!
//! Keeps the account store and the live cookie jar in step. The jar holds
//! exactly one account's cookies at a time, so every sequence that clears or
//! rewrites it runs under a single-writer lock:
//!
//! - `switch_to`: auto-save the live account, clear the jar, write the target
//! - `switch_unless_live`: `switch_to`, unless the target is already live
//! - `prepare_new_login`: auto-save the live account, clear the jar
//!
//! Only the configured cookie store is read or cleared; other stores of the
//! same browser keep their sessions. Captures and listings only read the jar
//! and share the lock with each other. Mutating sequences run on their own task, so a caller that stops
//! waiting cannot leave the jar half cleared.

use std::sync::Arc;

use tokio::sync::RwLock;

use super::types::{
    AccountSummary, AutoSave, CurrentIdentity, LoginPrepReport, SessionState, SwitchReport,
    SyncError,
};
use crate::auth::{BatchReport, CookieJar, CookieRecord};
use crate::config::SiteConfig;
use crate::identity::IdentityProvider;
use crate::store::{AccountRecord, AccountStore};

struct Inner {
    jar: Arc<dyn CookieJar>,
    store: Arc<dyn AccountStore>,
    identity: Arc<dyn IdentityProvider>,
    site: SiteConfig,
    /// Write: jar-mutating sequence. Read: capture and listing.
    lock: RwLock<()>,
}

/// Orchestrates account capture and switching for one site
#[derive(Clone)]
pub struct SessionSync {
    inner: Arc<Inner>,
}

impl SessionSync {
    /// Creates an engine over a jar, a store and an identity provider
    pub fn new(
        jar: Arc<dyn CookieJar>,
        store: Arc<dyn AccountStore>,
        identity: Arc<dyn IdentityProvider>,
        site: SiteConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                jar,
                store,
                identity,
                site,
                lock: RwLock::new(()),
            }),
        }
    }

    /// Returns the managed site
    pub fn site(&self) -> &SiteConfig {
        &self.inner.site
    }

    /// Reads the live state from the identity cookie alone
    pub async fn live_state(&self) -> Result<SessionState, SyncError> {
        let _guard = self.inner.lock.read().await;
        let cookies = self.inner.live_cookies().await?;
        Ok(self.inner.state_of(&cookies))
    }

    /// Resolves who is live, via the identity cookie and the identity provider
    pub async fn current_identity(&self) -> Result<CurrentIdentity, SyncError> {
        let _guard = self.inner.lock.read().await;
        self.inner.current_identity().await
    }

    /// Captures the live session as a stored account
    ///
    /// Creates the account on first capture and refreshes it afterwards.
    pub async fn capture_current(&self) -> Result<AccountRecord, SyncError> {
        let _guard = self.inner.lock.read().await;
        let cookies = self.inner.live_cookies().await?;

        let identity = self
            .inner
            .identity
            .resolve(&cookies)
            .await
            .ok_or(SyncError::NoActiveSession)?;

        if cookies.is_empty() {
            return Err(SyncError::NoCookies(self.inner.site.domain.clone()));
        }

        let record = self
            .inner
            .store
            .upsert(AccountRecord::from_identity(identity, cookies))
            .await?;

        tracing::info!(
            "Captured account {} ({} cookies)",
            record.account_id,
            record.cookies.len()
        );
        Ok(record)
    }

    /// Copies the live cookies into the stored record of the live account
    ///
    /// The live account is named by the identity cookie; no identity lookup
    /// is made. Returns `false` when the live account was never captured.
    pub async fn auto_save_current(&self) -> Result<bool, SyncError> {
        let _guard = self.inner.lock.read().await;
        self.inner.auto_save().await
    }

    /// Replaces the live session with a stored account
    ///
    /// Fails with [`SyncError::UnknownAccount`] before touching anything if
    /// the account is not stored. Per-cookie failures do not stop the switch;
    /// they are reported in the returned [`SwitchReport`].
    pub async fn switch_to(&self, account_id: &str) -> Result<SwitchReport, SyncError> {
        let report = self.spawn_switch(account_id, false).await?;
        report.ok_or_else(|| SyncError::Task("switch skipped".into()))
    }

    /// Like [`SessionSync::switch_to`], but returns `None` without touching
    /// anything when `account_id` is already the live account
    ///
    /// The live check and the switch run under one write guard, so no other
    /// sequence can change the live account in between.
    pub async fn switch_unless_live(
        &self,
        account_id: &str,
    ) -> Result<Option<SwitchReport>, SyncError> {
        self.spawn_switch(account_id, true).await
    }

    async fn spawn_switch(
        &self,
        account_id: &str,
        skip_if_live: bool,
    ) -> Result<Option<SwitchReport>, SyncError> {
        let inner = Arc::clone(&self.inner);
        let account_id = account_id.to_string();

        tokio::spawn(async move { inner.switch_to(&account_id, skip_if_live).await })
            .await
            .map_err(|e| SyncError::Task(e.to_string()))?
    }

    /// Leaves the jar anonymous so a new account can log in
    ///
    /// Only local cookies are cleared; stored sessions stay valid on the
    /// server.
    pub async fn prepare_new_login(&self) -> Result<LoginPrepReport, SyncError> {
        let inner = Arc::clone(&self.inner);

        tokio::spawn(async move { inner.prepare_new_login().await })
            .await
            .map_err(|e| SyncError::Task(e.to_string()))?
    }

    /// Deletes a stored account; the live jar is left alone
    pub async fn remove_account(&self, account_id: &str) -> Result<(), SyncError> {
        if self.inner.store.delete(account_id).await? {
            tracing::info!("Removed account {}", account_id);
            Ok(())
        } else {
            Err(SyncError::UnknownAccount(account_id.to_string()))
        }
    }

    /// Lists stored accounts, most recently updated first
    pub async fn accounts(&self) -> Result<Vec<AccountSummary>, SyncError> {
        let _guard = self.inner.lock.read().await;

        let mut records = self.inner.store.list().await?;
        records.sort_by(|a, b| b.last_updated.cmp(&a.last_updated));

        let current = self.inner.current_identity().await?;
        let current_id = current.account_id();

        Ok(records
            .iter()
            .map(|r| AccountSummary::new(r, Some(r.account_id.as_str()) == current_id))
            .collect())
    }
}

impl Inner {
    async fn live_cookies(&self) -> Result<Vec<CookieRecord>, SyncError> {
        Ok(self
            .jar
            .list_cookies(&self.site.domain, &self.site.store_id)
            .await?)
    }

    fn state_of(&self, cookies: &[CookieRecord]) -> SessionState {
        cookies
            .iter()
            .find(|c| c.name == self.site.identity_cookie && !c.value.is_empty())
            .map(|c| SessionState::Authenticated(c.value.clone()))
            .unwrap_or(SessionState::Anonymous)
    }

    async fn current_identity(&self) -> Result<CurrentIdentity, SyncError> {
        let cookies = self.live_cookies().await?;
        let state = self.state_of(&cookies);
        let identity = self.identity.resolve(&cookies).await;

        Ok(CurrentIdentity { state, identity })
    }

    async fn auto_save(&self) -> Result<bool, SyncError> {
        let cookies = self.live_cookies().await?;

        let account_id = match self.state_of(&cookies) {
            SessionState::Authenticated(id) => id,
            SessionState::Anonymous => {
                tracing::debug!("[AutoSave] No live account");
                return Ok(false);
            }
        };

        let saved = self.store.refresh_cookies(&account_id, cookies).await?;
        if saved {
            tracing::info!("[AutoSave] Updated cookies for account: {}", account_id);
        } else {
            tracing::debug!("[AutoSave] Live account {} was never captured", account_id);
        }
        Ok(saved)
    }

    /// Auto-save step of a mutating sequence; failures become warnings
    async fn auto_save_before_clear(&self) -> AutoSave {
        match self.auto_save().await {
            Ok(saved) => AutoSave { saved, error: None },
            Err(e) => {
                tracing::warn!("[AutoSave] Failed, continuing: {}", e);
                AutoSave {
                    saved: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn clear_live(&self) -> Result<BatchReport, SyncError> {
        Ok(self
            .jar
            .clear_domain(&self.site.domain, &self.site.store_id)
            .await?)
    }

    /// Stored cookies of an account, placed in the managed store
    fn target_cookies(&self, record: &AccountRecord) -> Vec<CookieRecord> {
        record
            .cookies
            .iter()
            .cloned()
            .map(|c| c.with_store_id(self.site.store_id.clone()))
            .collect()
    }

    async fn switch_to(
        &self,
        account_id: &str,
        skip_if_live: bool,
    ) -> Result<Option<SwitchReport>, SyncError> {
        let _guard = self.lock.write().await;

        if skip_if_live {
            let cookies = self.live_cookies().await?;
            if self.state_of(&cookies).account_id() == Some(account_id) {
                tracing::debug!("Account {} is already live", account_id);
                return Ok(None);
            }
        }

        let target = self
            .store
            .get(account_id)
            .await?
            .ok_or_else(|| SyncError::UnknownAccount(account_id.to_string()))?;

        tracing::info!(
            "Switching to account {} in the {} jar",
            account_id,
            self.jar.name()
        );

        let auto_save = self.auto_save_before_clear().await;
        // The target may be the live account, just refreshed by the auto-save
        let target = if auto_save.saved {
            self.store.get(account_id).await?.unwrap_or(target)
        } else {
            target
        };

        // Every old cookie must be gone before the first write
        let cleared = self.clear_live().await?;
        let written = self.jar.write_all(&self.target_cookies(&target)).await;

        let report = SwitchReport {
            account_id: target.account_id,
            auto_save,
            cleared,
            written,
        };

        if report.is_complete() {
            tracing::info!(
                "Switched to account {} ({} cookies)",
                report.account_id,
                report.written.succeeded()
            );
        } else {
            for warning in report.warnings() {
                tracing::warn!("Switch to {}: {}", report.account_id, warning);
            }
        }
        Ok(Some(report))
    }

    async fn prepare_new_login(&self) -> Result<LoginPrepReport, SyncError> {
        let _guard = self.lock.write().await;

        let auto_save = self.auto_save_before_clear().await;
        let cleared = self.clear_live().await?;

        tracing::info!(
            "Cleared {} cookies for a new login on {}",
            cleared.succeeded(),
            self.site.domain
        );
        Ok(LoginPrepReport { auto_save, cleared })
    }
}
