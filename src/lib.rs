//! cookieswitch - Switch between logged-in accounts of one site
//!
//! Captures the browser's cookies for a site as named accounts and swaps
//! them back into the browser on demand, without logging out on the server.
//!
//! ## Features
//!
//! - Capture the live session as a stored account
//! - Switch accounts by replacing the site's cookies
//! - Clear the jar for a fresh login while keeping stored sessions valid
//! - Auto-save rotated cookies of the live account before every switch and
//!   on a timer
//!
//! ## Architecture
//!
//! - **Auth**: cookie records and cookie jars (Firefox profile, in-memory)
//! - **Identity**: resolves who the cookies belong to
//! - **Store**: durable account records
//! - **Sync**: capture and switch sequences under a single-writer lock
//! - **Commands**: transport-agnostic command surface and JSON messages
//! - **Agents**: background auto-save
//! - **Security**: redaction of cookie values in logs

pub mod agents;
pub mod auth;
pub mod commands;
pub mod config;
pub mod identity;
pub mod security;
pub mod store;
pub mod sync;

use std::sync::Arc;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use agents::{Agent, AutoSaveAgent, AutoSaveConfig};
use auth::FirefoxCookieJar;
use commands::CommandResponse;
use config::AppConfig;
use identity::NavIdentityProvider;
use store::JsonAccountStore;
use sync::SessionSync;

/// Application state shared by every transport
pub struct AppState {
    pub config: AppConfig,
    pub sync: SessionSync,
    /// Periodic auto-save, when enabled in the config
    pub auto_save: Option<Arc<AutoSaveAgent>>,
}

impl AppState {
    /// Wires the Firefox jar, the JSON store and the nav identity provider
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let jar = match &config.cookie_db_path {
            Some(path) => FirefoxCookieJar::new(path.clone()),
            None => FirefoxCookieJar::discover().context("Could not find a Firefox profile")?,
        };
        tracing::info!("Using cookie database {:?}", jar.db_path());

        let accounts_path = config.accounts_path()?;
        let store = JsonAccountStore::open(accounts_path.clone())
            .await
            .with_context(|| format!("Could not open account store {:?}", accounts_path))?;

        let identity =
            NavIdentityProvider::with_endpoint(&config.identity_endpoint, config.request_timeout());

        let sync = SessionSync::new(
            Arc::new(jar),
            Arc::new(store),
            Arc::new(identity),
            config.site(),
        );

        let auto_save = config.auto_save_period().map(|interval| {
            Arc::new(AutoSaveAgent::with_config(
                sync.clone(),
                AutoSaveConfig::with_interval(interval),
            ))
        });

        Ok(Self {
            config,
            sync,
            auto_save,
        })
    }

    /// Starts the auto-save agent in the background, if enabled
    pub fn start_agents(&self) {
        if let Some(agent) = &self.auto_save {
            let agent = agent.clone();
            tokio::spawn(async move {
                if let Err(e) = agent.start().await {
                    tracing::error!("Failed to start auto-save agent: {}", e);
                }
            });
        }
    }

    /// Stops background agents
    pub async fn stop_agents(&self) {
        if let Some(agent) = &self.auto_save {
            if let Err(e) = agent.stop().await {
                tracing::warn!("Failed to stop auto-save agent: {}", e);
            }
        }
    }

    /// Runs one raw JSON protocol message
    pub async fn handle_message(&self, raw: &str) -> CommandResponse {
        commands::handle_message(&self.sync, raw).await
    }
}

/// Installs the tracing subscriber; logs go to stderr
pub fn init_logging() {
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["cookieswitch=debug", "info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Serves the JSON message protocol over stdin/stdout, one message per line
pub async fn run() -> anyhow::Result<()> {
    init_logging();
    tracing::info!("Starting cookieswitch...");

    let state = AppState::new(AppConfig::load()).await?;
    state.start_agents();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = state.handle_message(line).await;
        let mut out = serde_json::to_vec(&response)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }

    state.stop_agents().await;
    tracing::info!("Input closed, shutting down");
    Ok(())
}
