//! Cookie snapshot types
//!
//! A [`CookieRecord`] is an immutable snapshot of one browser cookie, shaped
//! like the cookie objects browser extension APIs hand out so that exported
//! account files stay interchangeable with them.

use serde::{Deserialize, Serialize};

/// SameSite policy of a cookie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SameSite {
    /// Sent with cross-site requests (`SameSite=None`)
    #[serde(rename = "no_restriction", alias = "none")]
    None,
    /// `SameSite=Lax`
    #[serde(rename = "lax")]
    Lax,
    /// `SameSite=Strict`
    #[serde(rename = "strict")]
    Strict,
    /// No SameSite attribute was set
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
}

/// The identity of a cookie inside a jar
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CookieKey {
    pub domain: String,
    pub name: String,
    pub path: String,
}

/// A single cookie as captured from (or written to) a cookie jar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    /// Domain the cookie is scoped to; a leading dot marks a domain cookie
    pub domain: String,
    /// Cookie name
    pub name: String,
    /// Cookie value
    #[serde(default)]
    pub value: String,
    /// Path the cookie applies to
    #[serde(default = "default_path")]
    pub path: String,
    /// Whether the cookie is secure-only
    #[serde(default)]
    pub secure: bool,
    /// Whether the cookie is HTTP-only
    #[serde(default)]
    pub http_only: bool,
    /// SameSite policy
    #[serde(default)]
    pub same_site: SameSite,
    /// Cookie store (container / profile partition) the cookie lives in
    #[serde(default)]
    pub store_id: String,
    /// Expiration as fractional epoch seconds; `None` for session cookies
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<f64>,
}

fn default_path() -> String {
    "/".to_string()
}

impl CookieRecord {
    /// Creates a session cookie with default attributes
    pub fn new(
        domain: impl Into<String>,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
            value: value.into(),
            path: default_path(),
            secure: false,
            http_only: false,
            same_site: SameSite::Unspecified,
            store_id: String::new(),
            expiration_date: None,
        }
    }

    /// Sets the path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Marks the cookie secure-only
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Marks the cookie HTTP-only
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Sets the SameSite policy
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }

    /// Sets the cookie store id
    pub fn with_store_id(mut self, store_id: impl Into<String>) -> Self {
        self.store_id = store_id.into();
        self
    }

    /// Sets the expiration (epoch seconds)
    pub fn with_expiration(mut self, expiration_date: f64) -> Self {
        self.expiration_date = Some(expiration_date);
        self
    }

    /// Returns the domain without its leading dot
    pub fn host(&self) -> &str {
        strip_leading_dot(&self.domain)
    }

    /// Canonical URL the cookie is installed and removed under
    pub fn url(&self) -> String {
        canonical_url(&self.domain, &self.path)
    }

    /// Identity of the cookie within a jar
    pub fn key(&self) -> CookieKey {
        CookieKey {
            domain: self.domain.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
        }
    }

    /// Whether this is a session cookie (derived, never written back)
    pub fn is_session(&self) -> bool {
        self.expiration_date.is_none()
    }

    /// Whether the cookie is host-only (derived, never written back)
    pub fn is_host_only(&self) -> bool {
        !self.domain.starts_with('.')
    }

    /// Formats the cookie as a `name=value` pair for a Cookie header
    pub fn header_pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    /// Whether the cookie falls under `domain` (exact match or subdomain)
    pub fn matches_domain(&self, domain: &str) -> bool {
        domain_matches(&self.domain, domain)
    }
}

/// Strips a single leading dot from a cookie domain
pub fn strip_leading_dot(domain: &str) -> &str {
    domain.strip_prefix('.').unwrap_or(domain)
}

/// Builds `https://{host}{path}` for a cookie domain and path
pub fn canonical_url(domain: &str, path: &str) -> String {
    let host = strip_leading_dot(domain);
    if path.starts_with('/') {
        format!("https://{}{}", host, path)
    } else {
        format!("https://{}/{}", host, path)
    }
}

/// Checks whether `cookie_domain` is `domain` itself or one of its subdomains
pub fn domain_matches(cookie_domain: &str, domain: &str) -> bool {
    let cookie_host = strip_leading_dot(cookie_domain).to_ascii_lowercase();
    let target = strip_leading_dot(domain).to_ascii_lowercase();

    cookie_host == target || cookie_host.ends_with(&format!(".{}", target))
}

/// Formats cookies as a Cookie header value
pub fn format_cookie_header(cookies: &[CookieRecord]) -> String {
    cookies
        .iter()
        .map(CookieRecord::header_pair)
        .collect::<Vec<_>>()
        .join("; ")
}
