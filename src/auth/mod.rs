//! Authentication module - Live cookie state of the browser
//!
//! Provides:
//! - Cookie snapshot types shared by the jar and the account store
//! - The `CookieJar` abstraction with in-memory and Firefox profile backends

mod cookie;
mod cookie_jar;
mod firefox_jar;

pub use cookie::{
    canonical_url, domain_matches, format_cookie_header, strip_leading_dot, CookieKey,
    CookieRecord, SameSite,
};
pub use cookie_jar::{BatchReport, CookieFailure, CookieJar, JarError, MemoryCookieJar};
pub use firefox_jar::{find_profile_db, FirefoxCookieJar};

#[cfg(test)]
pub(crate) use firefox_jar::create_test_db;
