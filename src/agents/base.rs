//! Base agent trait and types
//!
//! Defines the Agent trait that background agents implement.

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur in agents
#[derive(Debug, Error)]
pub enum AgentError {
    /// Agent is already running
    #[error("Agent is already running")]
    AlreadyRunning,

    /// A single run of the agent's work failed
    #[error("Agent operation failed: {0}")]
    OperationFailed(String),
}

/// Status of an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStatus {
    /// Agent has never been started
    Idle,
    /// Agent loop is running
    Running,
    /// Agent loop is running but its last run failed
    Error(String),
    /// Agent has been stopped
    Stopped,
}

impl AgentStatus {
    /// Returns true if the agent loop is alive, healthy or not
    pub fn is_running(&self) -> bool {
        matches!(self, AgentStatus::Running | AgentStatus::Error(_))
    }

    /// Returns true if the agent is idle or stopped
    pub fn is_stopped(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Stopped)
    }

    /// Returns true if the last run failed
    pub fn has_error(&self) -> bool {
        matches!(self, AgentStatus::Error(_))
    }
}

/// Trait for background agents
///
/// Agents are long-running background tasks that can be started and stopped.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the unique identifier for this agent
    fn id(&self) -> &'static str;

    /// Returns the display name for this agent
    fn name(&self) -> &'static str;

    /// Returns the current status of the agent
    fn status(&self) -> AgentStatus;

    /// Runs the agent's main loop until [`Agent::stop`] is called
    async fn start(&self) -> Result<(), AgentError>;

    /// Signals the main loop to stop
    async fn stop(&self) -> Result<(), AgentError>;

    /// Runs the agent's work once, immediately
    async fn trigger(&self) -> Result<(), AgentError> {
        Ok(())
    }
}
