//! Identity module - Who is logged in with the live cookies
//!
//! The provider boundary is lossy: callers only ever see an
//! identity or `None`.

mod base;
mod nav;

pub use base::{IdentityDocument, IdentityError, IdentityProvider};
pub use nav::NavIdentityProvider;

#[cfg(test)]
pub use base::MockIdentityProvider;
