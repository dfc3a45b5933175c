//! Results, warnings and errors of session operations

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::auth::{BatchReport, JarError};
use crate::identity::IdentityDocument;
use crate::store::{AccountRecord, StoreError};

/// Errors returned by session operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// Capture attempted while no account is logged in
    #[error("No active session: log in before capturing the account")]
    NoActiveSession,

    /// Capture attempted while the jar holds no cookies for the site
    #[error("No cookies found for {0}")]
    NoCookies(String),

    /// The account id is not in the store
    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    /// The cookie jar could not be read or cleared
    #[error("Cookie jar error: {0}")]
    Jar(#[from] JarError),

    /// The account store could not be read or written
    #[error("Account store error: {0}")]
    Store(#[from] StoreError),

    /// The worker running a jar-mutating sequence died
    #[error("Session task failed: {0}")]
    Task(String),
}

/// Phase of a switch in which cookie operations failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchPhase {
    Clear,
    Write,
}

/// Non-fatal problems of a completed operation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncWarning {
    /// Some individual cookie removals or writes failed
    #[error("{} cookie(s) failed during {phase:?}: {}", .failed.len(), .failed.join(", "))]
    PartialCookieWriteFailure {
        phase: BatchPhase,
        failed: Vec<String>,
    },

    /// The live account's cookies could not be saved before clearing
    #[error("Auto-save of the live account failed: {0}")]
    AutoSaveFailed(String),
}

/// Outcome of the pre-clear auto-save step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AutoSave {
    /// Whether a stored account was refreshed from the live jar
    pub saved: bool,
    /// Why the auto-save failed, if it did
    pub error: Option<String>,
}

impl AutoSave {
    fn warning(&self) -> Option<SyncWarning> {
        self.error.clone().map(SyncWarning::AutoSaveFailed)
    }
}

fn batch_warning(phase: BatchPhase, report: &BatchReport) -> Option<SyncWarning> {
    if report.is_complete() {
        None
    } else {
        Some(SyncWarning::PartialCookieWriteFailure {
            phase,
            failed: report.failed_names(),
        })
    }
}

/// Outcome of a switch to a stored account
#[derive(Debug, Clone, PartialEq)]
pub struct SwitchReport {
    /// Account now installed in the jar
    pub account_id: String,
    pub auto_save: AutoSave,
    /// Removal of the previous live cookies
    pub cleared: BatchReport,
    /// Installation of the target account's cookies
    pub written: BatchReport,
}

impl SwitchReport {
    /// Returns true if every step succeeded for every cookie
    pub fn is_complete(&self) -> bool {
        self.warnings().is_empty()
    }

    /// Collects the non-fatal problems of this switch
    pub fn warnings(&self) -> Vec<SyncWarning> {
        [
            self.auto_save.warning(),
            batch_warning(BatchPhase::Clear, &self.cleared),
            batch_warning(BatchPhase::Write, &self.written),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Outcome of clearing the jar for a fresh login
#[derive(Debug, Clone, PartialEq)]
pub struct LoginPrepReport {
    pub auto_save: AutoSave,
    pub cleared: BatchReport,
}

impl LoginPrepReport {
    /// Collects the non-fatal problems of this operation
    pub fn warnings(&self) -> Vec<SyncWarning> {
        [
            self.auto_save.warning(),
            batch_warning(BatchPhase::Clear, &self.cleared),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

/// Who the live cookies belong to, judged by the identity cookie
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "accountId", rename_all = "camelCase")]
pub enum SessionState {
    Anonymous,
    Authenticated(String),
}

impl SessionState {
    /// Returns the live account id, if any
    pub fn account_id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated(id) => Some(id),
        }
    }
}

/// Live session as seen by both the identity cookie and the identity provider
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentIdentity {
    /// State derived from the identity cookie
    pub state: SessionState,
    /// Identity confirmed by the provider, if it answered
    pub identity: Option<IdentityDocument>,
}

impl CurrentIdentity {
    /// Live account id, preferring the provider's answer over the cookie
    pub fn account_id(&self) -> Option<&str> {
        self.identity
            .as_ref()
            .map(|i| i.account_id.as_str())
            .or_else(|| self.state.account_id())
    }
}

/// Listing entry for one stored account
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub account_id: String,
    pub display_name: String,
    pub avatar_url: String,
    pub level: u32,
    pub balance: f64,
    pub vip_status: i64,
    pub cookie_count: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_updated: DateTime<Utc>,
    /// Whether this account is the live one
    pub is_current: bool,
}

impl AccountSummary {
    pub fn new(record: &AccountRecord, is_current: bool) -> Self {
        Self {
            account_id: record.account_id.clone(),
            display_name: record.display_name.clone(),
            avatar_url: record.avatar_url.clone(),
            level: record.level,
            balance: record.balance,
            vip_status: record.vip_status,
            cookie_count: record.cookies.len(),
            last_updated: record.last_updated,
            is_current,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::CookieFailure;

    fn failed_batch(names: &[&str]) -> BatchReport {
        BatchReport {
            attempted: names.len() + 1,
            failures: names
                .iter()
                .map(|n| CookieFailure {
                    name: n.to_string(),
                    domain: ".bilibili.com".into(),
                    path: "/".into(),
                    reason: "rejected".into(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_switch_report_warnings() {
        let report = SwitchReport {
            account_id: "1001".into(),
            auto_save: AutoSave::default(),
            cleared: BatchReport::default(),
            written: failed_batch(&["SESSDATA", "bili_jct"]),
        };

        assert!(!report.is_complete());
        assert_eq!(
            report.warnings(),
            vec![SyncWarning::PartialCookieWriteFailure {
                phase: BatchPhase::Write,
                failed: vec!["SESSDATA".into(), "bili_jct".into()],
            }]
        );
        assert_eq!(
            report.warnings()[0].to_string(),
            "2 cookie(s) failed during Write: SESSDATA, bili_jct"
        );
    }

    #[test]
    fn test_login_prep_warnings() {
        let report = LoginPrepReport {
            auto_save: AutoSave {
                saved: false,
                error: Some("disk full".into()),
            },
            cleared: BatchReport::default(),
        };

        assert_eq!(
            report.warnings(),
            vec![SyncWarning::AutoSaveFailed("disk full".into())]
        );
    }

    #[test]
    fn test_session_state_serialization() {
        let json = serde_json::to_value(SessionState::Authenticated("1001".into())).unwrap();
        assert_eq!(json, serde_json::json!({"state": "authenticated", "accountId": "1001"}));

        let json = serde_json::to_value(SessionState::Anonymous).unwrap();
        assert_eq!(json, serde_json::json!({"state": "anonymous"}));
    }

    #[test]
    fn test_current_identity_prefers_provider() {
        let current = CurrentIdentity {
            state: SessionState::Authenticated("1001".into()),
            identity: Some(IdentityDocument::new("2002")),
        };
        assert_eq!(current.account_id(), Some("2002"));

        let fallback = CurrentIdentity {
            state: SessionState::Authenticated("1001".into()),
            identity: None,
        };
        assert_eq!(fallback.account_id(), Some("1001"));
    }
}
