//! Identity types and the provider trait
//!
//! An identity provider answers "who is logged in with these cookies". The
//! answer is best-effort: any failure is an anonymous session, never an error.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::CookieRecord;

/// Identity of a logged-in account, as reported by the site
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct IdentityDocument {
    /// Stable account key (the site's numeric user id)
    pub account_id: String,
    /// Display name
    #[serde(default)]
    pub display_name: String,
    /// Avatar image URL
    #[serde(default)]
    pub avatar_url: String,
    /// Account level
    #[serde(default)]
    pub level: u32,
    /// Account balance (site currency)
    #[serde(default)]
    pub balance: f64,
    /// VIP status code (0 = none)
    #[serde(default)]
    pub vip_status: i64,
}

impl IdentityDocument {
    /// Creates an identity with only the account id set
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            ..Default::default()
        }
    }

    /// Sets the display name
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Sets the avatar URL
    pub fn with_avatar_url(mut self, url: impl Into<String>) -> Self {
        self.avatar_url = url.into();
        self
    }

    /// Sets the level
    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    /// Sets the balance
    pub fn with_balance(mut self, balance: f64) -> Self {
        self.balance = balance;
        self
    }

    /// Sets the VIP status
    pub fn with_vip_status(mut self, vip_status: i64) -> Self {
        self.vip_status = vip_status;
        self
    }

    /// Returns true if the account has an active VIP membership
    pub fn is_vip(&self) -> bool {
        self.vip_status != 0
    }
}

/// Reasons an identity lookup produced no identity
///
/// These never leave the provider; they only shape the log line.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Network error during the lookup
    #[error("Identity endpoint unreachable: {0}")]
    Unreachable(#[from] reqwest::Error),

    /// Endpoint answered with a non-success HTTP status
    #[error("Identity endpoint returned HTTP {0}")]
    Http(u16),

    /// Response could not be interpreted
    #[error("Malformed identity response: {0}")]
    Malformed(String),

    /// Endpoint reports that the cookies are not logged in
    #[error("Not logged in (code {0})")]
    NotLoggedIn(i64),
}

/// Resolves the identity behind a set of live cookies
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the logged-in identity, or `None` for an anonymous session
    ///
    /// Implementations must absorb every failure into `None`.
    async fn resolve(&self, cookies: &[CookieRecord]) -> Option<IdentityDocument>;
}
