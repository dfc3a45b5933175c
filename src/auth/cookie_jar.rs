//! Cookie jar abstraction
//!
//! A cookie jar is the live cookie state for one site. Everything that
//! touches the browser's cookies goes through the [`CookieJar`] trait so the
//! session engine can run against a real browser profile or an in-memory jar.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use super::cookie::{strip_leading_dot, CookieRecord};
use crate::security::Redactor;

/// Errors that can occur during cookie jar operations
#[derive(Debug, Error)]
pub enum JarError {
    /// The cookie was rejected before reaching the store
    #[error("Invalid cookie: {0}")]
    InvalidCookie(String),

    /// Cookie database access error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Cookie database or profile not found
    #[error("Cookie database not found: {path}")]
    ProfileNotFound { path: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable not set
    #[error("Environment variable not set: {0}")]
    EnvVar(String),

    /// The blocking worker running the jar operation failed
    #[error("Jar task failed: {0}")]
    Task(String),
}

/// One cookie that could not be written or removed
#[derive(Debug, Clone, PartialEq)]
pub struct CookieFailure {
    pub name: String,
    pub domain: String,
    pub path: String,
    pub reason: String,
}

impl CookieFailure {
    fn new(cookie: &CookieRecord, error: &JarError) -> Self {
        Self {
            name: cookie.name.clone(),
            domain: cookie.domain.clone(),
            path: cookie.path.clone(),
            reason: error.to_string(),
        }
    }
}

/// Outcome of a best-effort batch of cookie writes or removals
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    /// Number of cookies the batch tried to write or remove
    pub attempted: usize,
    /// Cookies whose individual operation failed
    pub failures: Vec<CookieFailure>,
}

impl BatchReport {
    /// Number of cookies handled successfully
    pub fn succeeded(&self) -> usize {
        self.attempted - self.failures.len()
    }

    /// Returns true if every attempted operation succeeded
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Names of the cookies that failed
    pub fn failed_names(&self) -> Vec<String> {
        self.failures.iter().map(|f| f.name.clone()).collect()
    }

    fn record(&mut self, cookie: &CookieRecord, result: Result<(), JarError>, action: &str) {
        self.attempted += 1;
        if let Err(e) = result {
            tracing::warn!(
                "Failed to {} cookie {} ({}{}): {}",
                action,
                cookie.name,
                cookie.domain,
                cookie.path,
                e
            );
            self.failures.push(CookieFailure::new(cookie, &e));
        }
    }
}

/// Access to the live cookies of a browser
///
/// A jar may hold several cookie stores (containers, profiles). Reads and
/// removals are scoped to one store id; a write goes to the store named by
/// the cookie. Attributes the host derives on its own (host-only, session)
/// are outputs of the jar and are never part of a write.
#[async_trait]
pub trait CookieJar: Send + Sync {
    /// Returns the display name of the backing store (e.g., "Firefox")
    fn name(&self) -> &'static str;

    /// Lists every cookie of store `store_id` scoped to `domain` or one of
    /// its subdomains
    async fn list_cookies(&self, domain: &str, store_id: &str)
        -> Result<Vec<CookieRecord>, JarError>;

    /// Installs a cookie under its canonical URL with all transferable attributes
    async fn set_cookie(&self, cookie: &CookieRecord) -> Result<(), JarError>;

    /// Removes one cookie of store `store_id` by canonical URL
    /// (`domain` + `path`) and name
    async fn remove_cookie(
        &self,
        domain: &str,
        path: &str,
        name: &str,
        store_id: &str,
    ) -> Result<(), JarError>;

    /// Removes every cookie of store `store_id` scoped to `domain`
    ///
    /// Failing to enumerate the jar is an error; individual removal failures
    /// are logged and collected in the report.
    async fn clear_domain(&self, domain: &str, store_id: &str) -> Result<BatchReport, JarError> {
        let cookies = self.list_cookies(domain, store_id).await?;
        let mut report = BatchReport::default();

        for cookie in &cookies {
            let result = self
                .remove_cookie(&cookie.domain, &cookie.path, &cookie.name, store_id)
                .await;
            report.record(cookie, result, "remove");
        }

        tracing::debug!(
            "Cleared {}/{} cookies for {} from the {} jar",
            report.succeeded(),
            report.attempted,
            domain,
            self.name()
        );
        Ok(report)
    }

    /// Writes every cookie, continuing past individual failures
    async fn write_all(&self, cookies: &[CookieRecord]) -> BatchReport {
        let mut report = BatchReport::default();

        for cookie in cookies {
            let result = self.set_cookie(cookie).await;
            report.record(cookie, result, "set");
        }

        report
    }
}

/// Rejects cookies no browser would accept
pub(crate) fn validate_cookie(cookie: &CookieRecord) -> Result<(), JarError> {
    if cookie.name.is_empty() {
        return Err(JarError::InvalidCookie("cookie name is empty".into()));
    }
    if strip_leading_dot(&cookie.domain).is_empty() {
        return Err(JarError::InvalidCookie(format!(
            "cookie {} has no domain",
            cookie.name
        )));
    }
    Ok(())
}

/// Whether a stored cookie sits under the canonical URL of `domain` + `path`
pub(crate) fn same_location(cookie: &CookieRecord, domain: &str, path: &str) -> bool {
    cookie.host().eq_ignore_ascii_case(strip_leading_dot(domain)) && cookie.path == path
}

/// In-memory cookie jar
///
/// Holds cookies for any number of domains. Useful for hosts that own the
/// cookie state themselves and for tests.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: RwLock<Vec<CookieRecord>>,
}

impl MemoryCookieJar {
    /// Creates an empty jar
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a jar pre-populated with cookies
    pub fn with_cookies(cookies: Vec<CookieRecord>) -> Self {
        Self {
            cookies: RwLock::new(cookies),
        }
    }

    /// Returns every cookie in the jar regardless of domain
    pub async fn snapshot(&self) -> Vec<CookieRecord> {
        self.cookies.read().await.clone()
    }

    /// Returns the value of the first cookie named `name`
    pub async fn value_of(&self, name: &str) -> Option<String> {
        self.cookies
            .read()
            .await
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.value.clone())
    }
}

#[async_trait]
impl CookieJar for MemoryCookieJar {
    fn name(&self) -> &'static str {
        "Memory"
    }

    async fn list_cookies(
        &self,
        domain: &str,
        store_id: &str,
    ) -> Result<Vec<CookieRecord>, JarError> {
        Ok(self
            .cookies
            .read()
            .await
            .iter()
            .filter(|c| c.store_id == store_id && c.matches_domain(domain))
            .cloned()
            .collect())
    }

    async fn set_cookie(&self, cookie: &CookieRecord) -> Result<(), JarError> {
        validate_cookie(cookie)?;
        tracing::debug!("Setting {} at {}", Redactor::cookie(cookie), cookie.url());

        let mut cookies = self.cookies.write().await;
        cookies.retain(|c| !(c.key() == cookie.key() && c.store_id == cookie.store_id));
        cookies.push(cookie.clone());
        Ok(())
    }

    async fn remove_cookie(
        &self,
        domain: &str,
        path: &str,
        name: &str,
        store_id: &str,
    ) -> Result<(), JarError> {
        self.cookies.write().await.retain(|c| {
            !(c.name == name && c.store_id == store_id && same_location(c, domain, path))
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    fn bili(name: &str, value: &str) -> CookieRecord {
        CookieRecord::new(".bilibili.com", name, value)
    }

    #[tokio::test]
    async fn test_list_filters_by_domain() {
        let jar = MemoryCookieJar::with_cookies(vec![
            bili("SESSDATA", "a"),
            CookieRecord::new("www.bilibili.com", "buvid3", "b"),
            CookieRecord::new(".example.com", "other", "c"),
        ]);

        let cookies = jar.list_cookies("bilibili.com", "").await.unwrap();
        assert_eq!(cookies.len(), 2);
        assert!(cookies.iter().all(|c| c.name != "other"));
    }

    #[tokio::test]
    async fn test_set_replaces_same_key() {
        let jar = MemoryCookieJar::new();
        assert_ok!(jar.set_cookie(&bili("SESSDATA", "old")).await);
        assert_ok!(jar.set_cookie(&bili("SESSDATA", "new")).await);

        let cookies = jar.snapshot().await;
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies[0].value, "new");
    }

    #[tokio::test]
    async fn test_set_keeps_different_paths() {
        let jar = MemoryCookieJar::new();
        jar.set_cookie(&bili("a", "1")).await.unwrap();
        jar.set_cookie(&bili("a", "2").with_path("/video")).await.unwrap();

        assert_eq!(jar.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_set_rejects_invalid_cookie() {
        let jar = MemoryCookieJar::new();
        let result = jar.set_cookie(&bili("", "x")).await;
        assert!(matches!(result, Err(JarError::InvalidCookie(_))));

        let result = jar.set_cookie(&CookieRecord::new(".", "a", "x")).await;
        assert!(matches!(result, Err(JarError::InvalidCookie(_))));
        assert!(jar.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_by_url_and_name() {
        let jar = MemoryCookieJar::with_cookies(vec![
            bili("SESSDATA", "a"),
            bili("bili_jct", "b"),
            bili("SESSDATA", "c").with_path("/other"),
        ]);

        jar.remove_cookie("bilibili.com", "/", "SESSDATA", "").await.unwrap();

        let names: Vec<_> = jar
            .snapshot()
            .await
            .into_iter()
            .map(|c| (c.name, c.path))
            .collect();
        assert_eq!(
            names,
            vec![
                ("bili_jct".to_string(), "/".to_string()),
                ("SESSDATA".to_string(), "/other".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_clear_domain_leaves_other_domains() {
        let jar = MemoryCookieJar::with_cookies(vec![
            bili("SESSDATA", "a"),
            CookieRecord::new("passport.bilibili.com", "x", "1"),
            CookieRecord::new(".example.com", "keep", "1"),
        ]);

        let report = jar.clear_domain("bilibili.com", "").await.unwrap();
        assert_eq!(report.attempted, 2);
        assert!(report.is_complete());

        let remaining = jar.snapshot().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "keep");
    }

    #[tokio::test]
    async fn test_write_all_continues_past_failures() {
        let jar = MemoryCookieJar::new();
        let report = jar
            .write_all(&[bili("a", "1"), bili("", "bad"), bili("c", "3")])
            .await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed_names(), vec![String::new()]);
        assert_eq!(jar.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn test_store_scoping() {
        let container = "^userContextId=1";
        let jar = MemoryCookieJar::with_cookies(vec![
            bili("DedeUserID", "1001"),
            bili("DedeUserID", "2002").with_store_id(container),
            bili("SESSDATA", "v2").with_store_id(container),
        ]);

        let default_store = jar.list_cookies("bilibili.com", "").await.unwrap();
        assert_eq!(default_store.len(), 1);
        assert_eq!(default_store[0].value, "1001");
        assert_eq!(jar.list_cookies("bilibili.com", container).await.unwrap().len(), 2);

        jar.remove_cookie("bilibili.com", "/", "DedeUserID", "").await.unwrap();
        let report = jar.clear_domain("bilibili.com", "").await.unwrap();
        assert_eq!(report.attempted, 0);

        let remaining = jar.snapshot().await;
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().all(|c| c.store_id == container));
    }

    #[tokio::test]
    async fn test_value_of() {
        let jar = MemoryCookieJar::with_cookies(vec![bili("DedeUserID", "1001")]);
        assert_eq!(jar.value_of("DedeUserID").await, Some("1001".to_string()));
        assert_eq!(jar.value_of("missing").await, None);
    }
}
