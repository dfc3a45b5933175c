//! Test doubles shared by the session, command and agent tests

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::auth::{CookieJar, CookieRecord, JarError, MemoryCookieJar};
use crate::config::{SiteConfig, IDENTITY_COOKIE};
use crate::identity::{IdentityDocument, MockIdentityProvider};
use crate::store::{AccountRecord, AccountStore, MemoryAccountStore};

use super::SessionSync;

pub(crate) fn bili(name: &str, value: &str) -> CookieRecord {
    CookieRecord::new(".bilibili.com", name, value)
}

/// Cookie set of a logged-in account
pub(crate) fn account_cookies(id: &str, sessdata: &str) -> Vec<CookieRecord> {
    vec![
        bili(IDENTITY_COOKIE, id),
        bili("SESSDATA", sessdata).with_http_only(true).with_secure(true),
        bili("bili_jct", &format!("csrf-{}", id)),
    ]
}

pub(crate) fn account(id: &str, sessdata: &str) -> AccountRecord {
    AccountRecord::from_identity(
        IdentityDocument::new(id).with_display_name(format!("user-{}", id)),
        account_cookies(id, sessdata),
    )
}

/// Provider that reports whoever the identity cookie names
pub(crate) fn cookie_identity() -> MockIdentityProvider {
    let mut provider = MockIdentityProvider::new();
    provider.expect_resolve().returning(|cookies| {
        cookies
            .iter()
            .find(|c| c.name == IDENTITY_COOKIE && !c.value.is_empty())
            .map(|c| IdentityDocument::new(c.value.clone()).with_display_name("live"))
    });
    provider
}

/// Provider that is never reachable
pub(crate) fn offline_identity() -> MockIdentityProvider {
    let mut provider = MockIdentityProvider::new();
    provider.expect_resolve().returning(|_| None);
    provider
}

pub(crate) struct Harness {
    pub jar: Arc<MemoryCookieJar>,
    pub store: Arc<MemoryAccountStore>,
    pub sync: SessionSync,
}

pub(crate) async fn harness(
    live: Vec<CookieRecord>,
    stored: Vec<AccountRecord>,
    provider: MockIdentityProvider,
) -> Harness {
    let jar = Arc::new(MemoryCookieJar::with_cookies(live));
    let store = Arc::new(MemoryAccountStore::new());
    for record in stored {
        store.upsert(record).await.unwrap();
    }

    let sync = SessionSync::new(
        jar.clone(),
        store.clone(),
        Arc::new(provider),
        SiteConfig::default(),
    );
    Harness { jar, store, sync }
}

/// Sorted (name, value) pairs for comparing cookie sets
pub(crate) fn pairs(cookies: &[CookieRecord]) -> Vec<(String, String)> {
    let mut pairs: Vec<_> = cookies
        .iter()
        .map(|c| (c.name.clone(), c.value.clone()))
        .collect();
    pairs.sort();
    pairs
}

/// Jar that rejects writes and removals of selected cookie names
pub(crate) struct FlakyJar {
    pub inner: MemoryCookieJar,
    pub fail_set: HashSet<String>,
    pub fail_remove: HashSet<String>,
}

#[async_trait]
impl CookieJar for FlakyJar {
    fn name(&self) -> &'static str {
        "Flaky"
    }

    async fn list_cookies(
        &self,
        domain: &str,
        store_id: &str,
    ) -> Result<Vec<CookieRecord>, JarError> {
        self.inner.list_cookies(domain, store_id).await
    }

    async fn set_cookie(&self, cookie: &CookieRecord) -> Result<(), JarError> {
        if self.fail_set.contains(&cookie.name) {
            return Err(JarError::InvalidCookie(format!("{} rejected", cookie.name)));
        }
        self.inner.set_cookie(cookie).await
    }

    async fn remove_cookie(
        &self,
        domain: &str,
        path: &str,
        name: &str,
        store_id: &str,
    ) -> Result<(), JarError> {
        if self.fail_remove.contains(name) {
            return Err(JarError::Task(format!("{} locked", name)));
        }
        self.inner.remove_cookie(domain, path, name, store_id).await
    }
}

/// Jar whose every operation yields to the scheduler and takes a while
pub(crate) struct SlowJar {
    pub inner: Arc<MemoryCookieJar>,
    pub delay: Duration,
}

#[async_trait]
impl CookieJar for SlowJar {
    fn name(&self) -> &'static str {
        "Slow"
    }

    async fn list_cookies(
        &self,
        domain: &str,
        store_id: &str,
    ) -> Result<Vec<CookieRecord>, JarError> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_cookies(domain, store_id).await
    }

    async fn set_cookie(&self, cookie: &CookieRecord) -> Result<(), JarError> {
        tokio::time::sleep(self.delay).await;
        self.inner.set_cookie(cookie).await
    }

    async fn remove_cookie(
        &self,
        domain: &str,
        path: &str,
        name: &str,
        store_id: &str,
    ) -> Result<(), JarError> {
        tokio::time::sleep(self.delay).await;
        self.inner.remove_cookie(domain, path, name, store_id).await
    }
}

/// Jar that cannot even be enumerated
pub(crate) struct BrokenJar;

#[async_trait]
impl CookieJar for BrokenJar {
    fn name(&self) -> &'static str {
        "Broken"
    }

    async fn list_cookies(&self, _: &str, _: &str) -> Result<Vec<CookieRecord>, JarError> {
        Err(JarError::ProfileNotFound {
            path: "/nonexistent/cookies.sqlite".into(),
        })
    }

    async fn set_cookie(&self, _cookie: &CookieRecord) -> Result<(), JarError> {
        panic!("set_cookie must not be reached when listing fails");
    }

    async fn remove_cookie(&self, _: &str, _: &str, _: &str, _: &str) -> Result<(), JarError> {
        panic!("remove_cookie must not be reached when listing fails");
    }
}
