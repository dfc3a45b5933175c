//! Agent module - Background tasks and periodic operations
//!
//! Provides the periodic auto-save of the live account's cookies.

mod autosave_agent;
mod base;

pub use autosave_agent::{AutoSaveAgent, AutoSaveConfig};
pub use base::{Agent, AgentError, AgentStatus};
