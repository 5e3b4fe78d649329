//! Execution result types
//!
//! One `ExecutionResult` per observation: every trigger, poll, or stream event
//! produces a fresh immutable snapshot. Callers test terminality through the
//! classification methods instead of matching state names themselves.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Execution state vocabulary as reported by Kestra.
///
/// States the client does not recognize are preserved verbatim in `Other` and
/// classified as non-terminal, so a newer server cannot make the follower
/// stop early on a state it does not understand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionState {
    Created,
    Running,
    Success,
    Failed,
    Killed,
    Other(String),
}

impl ExecutionState {
    pub fn as_str(&self) -> &str {
        match self {
            ExecutionState::Created => "CREATED",
            ExecutionState::Running => "RUNNING",
            ExecutionState::Success => "SUCCESS",
            ExecutionState::Failed => "FAILED",
            ExecutionState::Killed => "KILLED",
            ExecutionState::Other(s) => s,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionState::Success)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ExecutionState::Failed | ExecutionState::Killed)
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self,
            ExecutionState::Created | ExecutionState::Running | ExecutionState::Other(_)
        )
    }

    /// Terminal iff the execution can no longer transition.
    pub fn is_terminal(&self) -> bool {
        !self.is_running()
    }
}

impl From<String> for ExecutionState {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "CREATED" => ExecutionState::Created,
            "RUNNING" => ExecutionState::Running,
            "SUCCESS" => ExecutionState::Success,
            "FAILED" => ExecutionState::Failed,
            "KILLED" => ExecutionState::Killed,
            _ => ExecutionState::Other(raw),
        }
    }
}

impl From<ExecutionState> for String {
    fn from(state: ExecutionState) -> String {
        state.as_str().to_string()
    }
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable snapshot of one execution's observed state.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Identifier assigned by Kestra; never empty after a successful trigger.
    pub execution_id: String,
    pub state: ExecutionState,
    pub namespace: String,
    pub flow_id: String,
    /// Opaque output bag owned by the flow; the client never interprets it.
    pub outputs: Option<Map<String, Value>>,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    pub fn is_failed(&self) -> bool {
        self.state.is_failed()
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
