//! Redaction of credentials for logs and display
//!
//! Cookie values are session credentials. Anything that reaches a log line
//! goes through [`Redactor`] first.

use crate::auth::CookieRecord;

/// Masks credential material before it is logged
pub struct Redactor;

impl Redactor {
    /// Masks a secret value, keeping only its last 4 characters
    ///
    /// # Examples
    ///
    /// ```
    /// use cookieswitch_lib::security::Redactor;
    ///
    /// assert_eq!(Redactor::secret("0a1b2c3d%2C1790000000"), "***0000");
    /// assert_eq!(Redactor::secret("abc"), "****");
    /// ```
    pub fn secret(value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() > 4 {
            let tail: String = chars[chars.len() - 4..].iter().collect();
            format!("***{}", tail)
        } else {
            "****".to_string()
        }
    }

    /// Formats a cookie as `name=<masked value>`
    ///
    /// # Examples
    ///
    /// ```
    /// use cookieswitch_lib::auth::CookieRecord;
    /// use cookieswitch_lib::security::Redactor;
    ///
    /// let cookie = CookieRecord::new(".bilibili.com", "SESSDATA", "abcdef123456");
    /// assert_eq!(Redactor::cookie(&cookie), "SESSDATA=***3456");
    /// ```
    pub fn cookie(cookie: &CookieRecord) -> String {
        format!("{}={}", cookie.name, Self::secret(&cookie.value))
    }

    /// Strips query string and fragment from a URL
    pub fn url(url: &str) -> &str {
        let end = url.find(['?', '#']).unwrap_or(url.len());
        &url[..end]
    }
}
