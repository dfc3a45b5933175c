//! Account capture and switching
//!
//! [`SessionSync`] ties a [`CookieJar`](crate::auth::CookieJar), an
//! [`AccountStore`](crate::store::AccountStore) and an
//! [`IdentityProvider`](crate::identity::IdentityProvider) together.

mod engine;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::SessionSync;
pub use types::{
    AccountSummary, AutoSave, BatchPhase, CurrentIdentity, LoginPrepReport, SessionState,
    SwitchReport, SyncError, SyncWarning,
};
