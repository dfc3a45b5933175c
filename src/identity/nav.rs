//! Navigation-endpoint identity provider
//!
//! Calls the site's `nav` endpoint with the live cookies attached. The
//! endpoint answers `code == 0` with `data.isLogin == true` for a logged-in
//! session and a non-zero code otherwise.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::base::{IdentityDocument, IdentityError, IdentityProvider};
use crate::auth::{format_cookie_header, CookieRecord};
use crate::config::{DEFAULT_IDENTITY_ENDPOINT, DEFAULT_REQUEST_TIMEOUT_SECS};
use crate::security::Redactor;

const USER_AGENT: &str = concat!("cookieswitch/", env!("CARGO_PKG_VERSION"));

/// Envelope of the nav endpoint response
#[derive(Debug, Deserialize)]
struct NavResponse {
    code: i64,
    #[serde(default)]
    data: Option<NavData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NavData {
    #[serde(default)]
    is_login: bool,
    mid: Option<u64>,
    #[serde(default)]
    uname: String,
    #[serde(default)]
    face: String,
    #[serde(default, rename = "level_info")]
    level_info: Option<NavLevelInfo>,
    #[serde(default)]
    money: Option<f64>,
    #[serde(default)]
    vip: Option<NavVip>,
}

#[derive(Debug, Deserialize)]
struct NavLevelInfo {
    #[serde(default)]
    current_level: u32,
}

#[derive(Debug, Deserialize)]
struct NavVip {
    #[serde(default)]
    status: i64,
}

/// Identity provider backed by the site's nav endpoint
pub struct NavIdentityProvider {
    client: Client,
    endpoint: String,
}

impl NavIdentityProvider {
    /// Creates a provider for the default endpoint
    pub fn new() -> Self {
        Self::with_endpoint(
            DEFAULT_IDENTITY_ENDPOINT,
            Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Creates a provider for a custom endpoint (mirrors, tests)
    pub fn with_endpoint(endpoint: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Falling back to default HTTP client: {}", e);
                Client::new()
            });

        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }

    /// Returns the endpoint this provider calls
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Performs the lookup, reporting why no identity was found
    pub async fn fetch_identity(
        &self,
        cookies: &[CookieRecord],
    ) -> Result<IdentityDocument, IdentityError> {
        tracing::debug!("Resolving identity via {}", Redactor::url(&self.endpoint));

        let mut request = self.client.get(&self.endpoint);
        if !cookies.is_empty() {
            request = request.header(reqwest::header::COOKIE, format_cookie_header(cookies));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(IdentityError::Http(status.as_u16()));
        }

        let body = response.text().await?;
        parse_nav_response(&body)
    }
}

impl Default for NavIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for NavIdentityProvider {
    async fn resolve(&self, cookies: &[CookieRecord]) -> Option<IdentityDocument> {
        match self.fetch_identity(cookies).await {
            Ok(identity) => {
                tracing::debug!("Live session belongs to account {}", identity.account_id);
                Some(identity)
            }
            Err(IdentityError::NotLoggedIn(code)) => {
                tracing::debug!("Live session is anonymous (code {})", code);
                None
            }
            Err(e) => {
                tracing::warn!("Treating session as anonymous: {}", e);
                None
            }
        }
    }
}

fn parse_nav_response(body: &str) -> Result<IdentityDocument, IdentityError> {
    let response: NavResponse =
        serde_json::from_str(body).map_err(|e| IdentityError::Malformed(e.to_string()))?;

    let data = match response.data {
        Some(data) if response.code == 0 && data.is_login => data,
        _ => return Err(IdentityError::NotLoggedIn(response.code)),
    };

    let mid = data
        .mid
        .ok_or_else(|| IdentityError::Malformed("logged-in response without mid".into()))?;

    Ok(IdentityDocument {
        account_id: mid.to_string(),
        display_name: data.uname,
        avatar_url: data.face,
        level: data.level_info.map(|l| l.current_level).unwrap_or_default(),
        balance: data.money.unwrap_or_default(),
        vip_status: data.vip.map(|v| v.status).unwrap_or_default(),
    })
}
