//! Firefox profile cookie jar
//!
//! Reads and writes the `moz_cookies` table of a Firefox profile's
//! `cookies.sqlite`. Firefox stores values in plaintext, so the jar can both
//! capture and restore cookies without any decryption step.
//!
//! Firefox holds a lock on the database while it runs; writes wait on the
//! busy timeout and fail with a database error if the lock is not released.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection};

use super::cookie::{strip_leading_dot, CookieRecord, SameSite};
use super::cookie_jar::{validate_cookie, CookieJar, JarError};
use crate::security::Redactor;

const BUSY_TIMEOUT: Duration = Duration::from_secs(2);

// moz_cookies.sameSite values
const SQL_SAMESITE_NONE: i64 = 0;
const SQL_SAMESITE_LAX: i64 = 1;
const SQL_SAMESITE_STRICT: i64 = 2;
const SQL_SAMESITE_UNSET: i64 = 256;

/// Cookie jar backed by a Firefox profile
pub struct FirefoxCookieJar {
    db_path: PathBuf,
}

impl FirefoxCookieJar {
    /// Opens the jar at an explicit `cookies.sqlite` path
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Opens the jar of the default Firefox profile for the current user
    pub fn discover() -> Result<Self, JarError> {
        let profiles_dir = Self::profiles_dir()?;
        Ok(Self::new(find_profile_db(&profiles_dir)?))
    }

    /// Returns the path of the backing database
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Returns the directory holding Firefox profiles (cross-platform)
    pub fn profiles_dir() -> Result<PathBuf, JarError> {
        #[cfg(target_os = "windows")]
        {
            let app_data =
                std::env::var("APPDATA").map_err(|_| JarError::EnvVar("APPDATA".into()))?;
            Ok(PathBuf::from(app_data)
                .join("Mozilla")
                .join("Firefox")
                .join("Profiles"))
        }

        #[cfg(target_os = "macos")]
        {
            let home = std::env::var("HOME").map_err(|_| JarError::EnvVar("HOME".into()))?;
            Ok(PathBuf::from(home).join("Library/Application Support/Firefox/Profiles"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            let home = std::env::var("HOME").map_err(|_| JarError::EnvVar("HOME".into()))?;
            Ok(PathBuf::from(home).join(".mozilla").join("firefox"))
        }
    }

    /// Runs a database operation on the blocking pool
    async fn with_connection<T, F>(&self, op: F) -> Result<T, JarError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, JarError> + Send + 'static,
    {
        let path = self.db_path.clone();
        if !path.exists() {
            return Err(JarError::ProfileNotFound {
                path: path.to_string_lossy().into(),
            });
        }

        tokio::task::spawn_blocking(move || {
            let mut conn = Connection::open(&path)?;
            conn.busy_timeout(BUSY_TIMEOUT)?;
            op(&mut conn)
        })
        .await
        .map_err(|e| JarError::Task(e.to_string()))?
    }
}

#[async_trait]
impl CookieJar for FirefoxCookieJar {
    fn name(&self) -> &'static str {
        "Firefox"
    }

    async fn list_cookies(
        &self,
        domain: &str,
        store_id: &str,
    ) -> Result<Vec<CookieRecord>, JarError> {
        let domain = strip_leading_dot(domain).to_string();
        let store_id = store_id.to_string();

        self.with_connection(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT name, value, host, path, expiry, isSecure, isHttpOnly, sameSite, originAttributes
                 FROM moz_cookies
                 WHERE originAttributes = ?4 AND (host = ?1 OR host = ?2 OR host LIKE ?3)",
            )?;

            let rows = stmt.query_map(
                params![
                    domain,
                    format!(".{}", domain),
                    format!("%.{}", domain),
                    store_id
                ],
                |row| {
                    Ok(CookieRecord {
                        name: row.get(0)?,
                        value: row.get(1)?,
                        domain: row.get(2)?,
                        path: row.get(3)?,
                        expiration_date: row.get::<_, Option<i64>>(4)?.map(|e| e as f64),
                        secure: row.get(5)?,
                        http_only: row.get(6)?,
                        same_site: same_site_from_sql(row.get(7)?),
                        store_id: row.get(8)?,
                    })
                },
            )?;

            let mut cookies = Vec::new();
            for cookie in rows {
                let cookie = cookie?;
                // LIKE treats '_' as a wildcard
                if cookie.matches_domain(&domain) {
                    cookies.push(cookie);
                }
            }
            Ok(cookies)
        })
        .await
    }

    /// Writes one cookie into the store named by `cookie.store_id`
    ///
    /// `moz_cookies.expiry` holds whole seconds: a fractional expiration is
    /// truncated and reads back as the whole second before it.
    async fn set_cookie(&self, cookie: &CookieRecord) -> Result<(), JarError> {
        validate_cookie(cookie)?;
        tracing::debug!("Writing {} at {}", Redactor::cookie(cookie), cookie.url());

        let cookie = cookie.clone();
        self.with_connection(move |conn| {
            let now_micros = chrono::Utc::now().timestamp_micros();
            let same_site = same_site_to_sql(cookie.same_site);
            let tx = conn.transaction()?;

            tx.execute(
                "DELETE FROM moz_cookies
                 WHERE host = ?1 AND name = ?2 AND path = ?3 AND originAttributes = ?4",
                params![cookie.domain, cookie.name, cookie.path, cookie.store_id],
            )?;
            tx.execute(
                "INSERT INTO moz_cookies
                   (originAttributes, name, value, host, path, expiry, lastAccessed,
                    creationTime, isSecure, isHttpOnly, sameSite, rawSameSite)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7, ?8, ?9, ?10, ?10)",
                params![
                    cookie.store_id,
                    cookie.name,
                    cookie.value,
                    cookie.domain,
                    cookie.path,
                    cookie.expiration_date.map(expiry_seconds),
                    now_micros,
                    cookie.secure,
                    cookie.http_only,
                    same_site,
                ],
            )?;

            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn remove_cookie(
        &self,
        domain: &str,
        path: &str,
        name: &str,
        store_id: &str,
    ) -> Result<(), JarError> {
        let host = strip_leading_dot(domain).to_string();
        let path = path.to_string();
        let name = name.to_string();
        let store_id = store_id.to_string();

        self.with_connection(move |conn| {
            conn.execute(
                "DELETE FROM moz_cookies
                 WHERE name = ?1 AND path = ?2 AND originAttributes = ?5
                   AND (host = ?3 OR host = ?4)",
                params![name, path, host, format!(".{}", host), store_id],
            )?;
            Ok(())
        })
        .await
    }
}

/// Expiration in whole seconds since the epoch, as `moz_cookies` stores it
fn expiry_seconds(expiration_date: f64) -> i64 {
    expiration_date.floor() as i64
}

/// Picks the cookie database of the default profile
///
/// Prefers `*.default-release` (the profile current Firefox creates) over the
/// legacy `*.default`.
pub fn find_profile_db(profiles_dir: &Path) -> Result<PathBuf, JarError> {
    let not_found = || JarError::ProfileNotFound {
        path: profiles_dir.to_string_lossy().into(),
    };

    if !profiles_dir.exists() {
        return Err(not_found());
    }

    let mut legacy = None;
    for entry in std::fs::read_dir(profiles_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        let db = entry.path().join("cookies.sqlite");

        if !db.exists() {
            continue;
        }
        if name.ends_with(".default-release") {
            return Ok(db);
        }
        if name.ends_with(".default") && legacy.is_none() {
            legacy = Some(db);
        }
    }

    legacy.ok_or_else(not_found)
}

fn same_site_from_sql(value: i64) -> SameSite {
    match value {
        SQL_SAMESITE_NONE => SameSite::None,
        SQL_SAMESITE_LAX => SameSite::Lax,
        SQL_SAMESITE_STRICT => SameSite::Strict,
        _ => SameSite::Unspecified,
    }
}

fn same_site_to_sql(same_site: SameSite) -> i64 {
    match same_site {
        SameSite::None => SQL_SAMESITE_NONE,
        SameSite::Lax => SQL_SAMESITE_LAX,
        SameSite::Strict => SQL_SAMESITE_STRICT,
        SameSite::Unspecified => SQL_SAMESITE_UNSET,
    }
}

/// Creates an empty `moz_cookies` database
#[cfg(test)]
pub(crate) fn create_test_db(path: &Path) -> Result<(), JarError> {
    Connection::open(path)?.execute(TEST_SCHEMA, [])?;
    Ok(())
}

#[cfg(test)]
const TEST_SCHEMA: &str = "CREATE TABLE moz_cookies (
    id INTEGER PRIMARY KEY,
    originAttributes TEXT NOT NULL DEFAULT '',
    name TEXT,
    value TEXT,
    host TEXT,
    path TEXT,
    expiry INTEGER,
    lastAccessed INTEGER,
    creationTime INTEGER,
    isSecure INTEGER,
    isHttpOnly INTEGER,
    sameSite INTEGER DEFAULT 0,
    rawSameSite INTEGER DEFAULT 0
)";
