//! Commands exposed to UI collaborators
//!
//! Every command returns `Result<T, String>` so any transport (extension
//! message port, IPC bridge, local socket) can forward it as-is. Hosts that
//! speak the JSON message protocol hand raw messages to [`handle_message`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sync::{AccountSummary, CurrentIdentity, SessionSync, SyncWarning};

/// Result of [`switch_account`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SwitchOutcome {
    /// The account was already live; nothing was touched
    AlreadyActive {
        #[serde(rename = "accountId")]
        account_id: String,
    },
    /// The jar now holds the account's cookies
    Switched {
        #[serde(rename = "accountId")]
        account_id: String,
        #[serde(rename = "autoSaved")]
        auto_saved: bool,
        cleared: usize,
        written: usize,
        warnings: Vec<String>,
    },
}

impl SwitchOutcome {
    fn warnings(&self) -> Vec<String> {
        match self {
            Self::AlreadyActive { .. } => Vec::new(),
            Self::Switched { warnings, .. } => warnings.clone(),
        }
    }
}

/// Result of [`prepare_new_login`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPrepSummary {
    pub auto_saved: bool,
    pub cleared: usize,
    pub warnings: Vec<String>,
}

fn warning_strings(warnings: Vec<SyncWarning>) -> Vec<String> {
    warnings.iter().map(ToString::to_string).collect()
}

/// Lists stored accounts, most recently updated first
pub async fn get_accounts(sync: &SessionSync) -> Result<Vec<AccountSummary>, String> {
    sync.accounts().await.map_err(|e| e.to_string())
}

/// Gets who is logged in right now
pub async fn get_current_identity(sync: &SessionSync) -> Result<CurrentIdentity, String> {
    sync.current_identity().await.map_err(|e| e.to_string())
}

/// Stores the live session as an account
pub async fn capture_current_account(sync: &SessionSync) -> Result<AccountSummary, String> {
    let record = sync.capture_current().await.map_err(|e| e.to_string())?;
    Ok(AccountSummary::new(&record, true))
}

/// Switches the browser to a stored account
pub async fn switch_account(sync: &SessionSync, account_id: &str) -> Result<SwitchOutcome, String> {
    let report = match sync
        .switch_unless_live(account_id)
        .await
        .map_err(|e| e.to_string())?
    {
        Some(report) => report,
        None => {
            return Ok(SwitchOutcome::AlreadyActive {
                account_id: account_id.to_string(),
            })
        }
    };

    Ok(SwitchOutcome::Switched {
        auto_saved: report.auto_save.saved,
        cleared: report.cleared.succeeded(),
        written: report.written.succeeded(),
        warnings: warning_strings(report.warnings()),
        account_id: report.account_id,
    })
}

/// Logs the browser out locally so a new account can sign in
pub async fn prepare_new_login(sync: &SessionSync) -> Result<LoginPrepSummary, String> {
    let report = sync.prepare_new_login().await.map_err(|e| e.to_string())?;
    Ok(LoginPrepSummary {
        auto_saved: report.auto_save.saved,
        cleared: report.cleared.succeeded(),
        warnings: warning_strings(report.warnings()),
    })
}

/// Deletes a stored account
pub async fn delete_account(sync: &SessionSync, account_id: &str) -> Result<(), String> {
    sync.remove_account(account_id)
        .await
        .map_err(|e| e.to_string())
}

/// A message of the JSON protocol
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    GetAccounts,
    GetUserInfo,
    AddAccount,
    SwitchAccount {
        #[serde(rename = "accountId", alias = "mid")]
        account_id: String,
    },
    LoginNew,
    DeleteAccount {
        #[serde(rename = "accountId", alias = "mid")]
        account_id: String,
    },
    #[serde(other)]
    Unknown,
}

/// Reply to a JSON protocol message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl CommandResponse {
    fn ok(data: Option<Value>, warnings: Vec<String>) -> Self {
        Self {
            success: true,
            data,
            error: None,
            warnings,
        }
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            warnings: Vec::new(),
        }
    }
}

fn to_data<T: Serialize>(value: &T) -> Result<Option<Value>, String> {
    serde_json::to_value(value)
        .map(Some)
        .map_err(|e| e.to_string())
}

/// Runs one protocol command
pub async fn dispatch(sync: &SessionSync, command: Command) -> CommandResponse {
    let result = match command {
        Command::GetAccounts => get_accounts(sync)
            .await
            .and_then(|accounts| to_data(&accounts))
            .map(|data| (data, Vec::new())),
        Command::GetUserInfo => get_current_identity(sync)
            .await
            .and_then(|current| to_data(&current))
            .map(|data| (data, Vec::new())),
        Command::AddAccount => capture_current_account(sync)
            .await
            .and_then(|summary| to_data(&summary))
            .map(|data| (data, Vec::new())),
        Command::SwitchAccount { account_id } => {
            switch_account(sync, &account_id).await.and_then(|outcome| {
                let warnings = outcome.warnings();
                to_data(&outcome).map(|data| (data, warnings))
            })
        }
        Command::LoginNew => prepare_new_login(sync).await.and_then(|summary| {
            let warnings = summary.warnings.clone();
            to_data(&summary).map(|data| (data, warnings))
        }),
        Command::DeleteAccount { account_id } => delete_account(sync, &account_id)
            .await
            .map(|()| (None, Vec::new())),
        Command::Unknown => Err("Unknown action".to_string()),
    };

    match result {
        Ok((data, warnings)) => CommandResponse::ok(data, warnings),
        Err(e) => {
            tracing::warn!("Command failed: {}", e);
            CommandResponse::failed(e)
        }
    }
}

/// Parses and runs one raw JSON protocol message
pub async fn handle_message(sync: &SessionSync, raw: &str) -> CommandResponse {
    match serde_json::from_str::<Command>(raw) {
        Ok(command) => dispatch(sync, command).await,
        Err(e) => CommandResponse::failed(format!("Invalid message: {}", e)),
    }
}
