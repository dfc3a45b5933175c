//! Auto-save agent - Periodically copies the live cookies into the store
//!
//! Session cookies rotate while the user browses. Saving them on a timer
//! keeps the stored copy of the live account fresh even when no switch
//! happens for a long time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use super::base::{Agent, AgentError, AgentStatus};
use crate::sync::SessionSync;

/// Configuration for the auto-save agent
#[derive(Debug, Clone)]
pub struct AutoSaveConfig {
    /// Interval between saves
    pub interval: Duration,
    /// Whether to save immediately on start
    pub save_on_start: bool,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5 * 60),
            save_on_start: true,
        }
    }
}

impl AutoSaveConfig {
    /// Creates a config with a custom interval
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Self::default()
        }
    }
}

/// Agent that keeps the live account's stored cookies current
pub struct AutoSaveAgent {
    config: AutoSaveConfig,
    sync: SessionSync,
    status: RwLock<AgentStatus>,
    cancel_token: Mutex<CancellationToken>,
    runs: AtomicU64,
    refreshes: AtomicU64,
}

impl AutoSaveAgent {
    /// Creates an agent with the default configuration
    pub fn new(sync: SessionSync) -> Self {
        Self::with_config(sync, AutoSaveConfig::default())
    }

    /// Creates an agent with a custom configuration
    pub fn with_config(sync: SessionSync, config: AutoSaveConfig) -> Self {
        Self {
            config,
            sync,
            status: RwLock::new(AgentStatus::Idle),
            cancel_token: Mutex::new(CancellationToken::new()),
            runs: AtomicU64::new(0),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Number of saves attempted so far
    pub fn run_count(&self) -> u64 {
        self.runs.load(Ordering::SeqCst)
    }

    /// Number of saves that refreshed a stored account
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::SeqCst)
    }

    async fn save_once(&self) -> Result<bool, AgentError> {
        self.runs.fetch_add(1, Ordering::SeqCst);

        let saved = self
            .sync
            .auto_save_current()
            .await
            .map_err(|e| AgentError::OperationFailed(e.to_string()))?;

        if saved {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(saved)
    }

    async fn tick(&self) {
        let next = match self.save_once().await {
            Ok(_) => AgentStatus::Running,
            Err(e) => {
                tracing::warn!("[AutoSave] Periodic save failed: {}", e);
                AgentStatus::Error(e.to_string())
            }
        };
        *self.status.write().await = next;
    }
}

#[async_trait]
impl Agent for AutoSaveAgent {
    fn id(&self) -> &'static str {
        "auto_save"
    }

    fn name(&self) -> &'static str {
        "Auto-save Agent"
    }

    fn status(&self) -> AgentStatus {
        self.status
            .try_read()
            .map(|s| s.clone())
            .unwrap_or(AgentStatus::Running)
    }

    async fn start(&self) -> Result<(), AgentError> {
        let token = {
            let mut status = self.status.write().await;
            if status.is_running() {
                return Err(AgentError::AlreadyRunning);
            }
            *status = AgentStatus::Running;

            // A cancelled token stays cancelled; each run gets a fresh one
            let token = CancellationToken::new();
            *self.cancel_token.lock().await = token.clone();
            token
        };

        tracing::info!(
            "Auto-save agent started (every {}s)",
            self.config.interval.as_secs()
        );

        if self.config.save_on_start {
            self.tick().await;
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.config.interval) => {
                    self.tick().await;
                }
                _ = token.cancelled() => {
                    tracing::info!("Auto-save agent cancelled");
                    break;
                }
            }
        }

        *self.status.write().await = AgentStatus::Stopped;
        Ok(())
    }

    async fn stop(&self) -> Result<(), AgentError> {
        if !self.status.read().await.is_running() {
            return Ok(());
        }

        self.cancel_token.lock().await.cancel();
        *self.status.write().await = AgentStatus::Stopped;
        Ok(())
    }

    async fn trigger(&self) -> Result<(), AgentError> {
        self.save_once().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::store::AccountStore;
    use crate::sync::testing::*;
    use std::sync::Arc;

    #[test]
    fn test_auto_save_config_default() {
        let config = AutoSaveConfig::default();
        assert_eq!(config.interval, Duration::from_secs(300));
        assert!(config.save_on_start);
    }

    #[tokio::test]
    async fn test_trigger_refreshes_live_account() {
        let h = harness(
            account_cookies("1001", "v1new"),
            vec![account("1001", "v1")],
            offline_identity(),
        )
        .await;
        let agent = AutoSaveAgent::new(h.sync.clone());
        assert_eq!(agent.status(), AgentStatus::Idle);

        agent.trigger().await.unwrap();

        assert_eq!(agent.run_count(), 1);
        assert_eq!(agent.refresh_count(), 1);
        let stored = h.store.get("1001").await.unwrap().unwrap();
        assert_eq!(stored.cookie_value("SESSDATA"), Some("v1new"));
    }

    #[tokio::test]
    async fn test_trigger_uncaptured_account() {
        let h = harness(account_cookies("3003", "v3"), vec![], offline_identity()).await;
        let agent = AutoSaveAgent::new(h.sync.clone());

        agent.trigger().await.unwrap();

        assert_eq!(agent.run_count(), 1);
        assert_eq!(agent.refresh_count(), 0);
    }

    #[tokio::test]
    async fn test_trigger_reports_jar_failure() {
        let sync = SessionSync::new(
            Arc::new(BrokenJar),
            Arc::new(crate::store::MemoryAccountStore::new()),
            Arc::new(offline_identity()),
            SiteConfig::default(),
        );
        let agent = AutoSaveAgent::new(sync);

        let result = agent.trigger().await;
        assert!(matches!(result, Err(AgentError::OperationFailed(_))));
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let h = harness(
            account_cookies("1001", "v1"),
            vec![account("1001", "v1")],
            offline_identity(),
        )
        .await;
        let agent = Arc::new(AutoSaveAgent::with_config(
            h.sync.clone(),
            AutoSaveConfig::with_interval(Duration::from_millis(10)),
        ));

        let runner = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.start().await })
        };

        tokio::time::sleep(Duration::from_millis(35)).await;
        assert!(agent.status().is_running());
        assert!(matches!(agent.start().await, Err(AgentError::AlreadyRunning)));

        agent.stop().await.unwrap();
        runner.await.unwrap().unwrap();

        assert_eq!(agent.status(), AgentStatus::Stopped);
        assert!(agent.run_count() >= 2);
        assert_eq!(agent.run_count(), agent.refresh_count());
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let h = harness(vec![], vec![], offline_identity()).await;
        let agent = Arc::new(AutoSaveAgent::with_config(
            h.sync.clone(),
            AutoSaveConfig::with_interval(Duration::from_secs(60)),
        ));

        for _ in 0..2 {
            let runner = {
                let agent = agent.clone();
                tokio::spawn(async move { agent.start().await })
            };
            tokio::time::sleep(Duration::from_millis(10)).await;
            agent.stop().await.unwrap();
            runner.await.unwrap().unwrap();
        }

        assert_eq!(agent.run_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_run_sets_error_status() {
        let sync = SessionSync::new(
            Arc::new(BrokenJar),
            Arc::new(crate::store::MemoryAccountStore::new()),
            Arc::new(offline_identity()),
            SiteConfig::default(),
        );
        let agent = Arc::new(AutoSaveAgent::with_config(
            sync,
            AutoSaveConfig::with_interval(Duration::from_secs(60)),
        ));

        let runner = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.start().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(agent.status().has_error());
        agent.stop().await.unwrap();
        runner.await.unwrap().unwrap();
    }
}
