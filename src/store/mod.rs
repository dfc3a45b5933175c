//! Account store module - Durable captured accounts
//!
//! Provides:
//! - `AccountRecord` and the `AccountStore` trait
//! - `JsonAccountStore` persisting every account under one well-known key
//! - `MemoryAccountStore` for embedding and tests

mod account;
mod json;
mod memory;

pub use account::{AccountRecord, AccountStore, StoreError};
pub use json::JsonAccountStore;
pub use memory::MemoryAccountStore;
