//! Wire types for the Kestra HTTP API
//!
//! Optional fields are modeled explicitly here and defaulted in one place,
//! `ExecutionDto::into_result`, so call sites never probe the response shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::DEFAULT_NAMESPACE;
use crate::execution::{ExecutionResult, ExecutionState};

/// Execution object as returned by create/get and by follow-stream events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionDto {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<StateDto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDto {
    pub current: ExecutionState,
    #[serde(default)]
    pub histories: Vec<StateHistoryDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateHistoryDto {
    pub state: ExecutionState,
    pub date: DateTime<Utc>,
}

impl ExecutionDto {
    /// Current state with the boundary default applied: a response without a
    /// state field describes a freshly created execution.
    pub fn current_state(&self) -> ExecutionState {
        self.state
            .as_ref()
            .map(|s| s.current.clone())
            .unwrap_or(ExecutionState::Created)
    }

    /// Convert into an immutable snapshot, defaulting absent fields.
    pub fn into_result(self) -> ExecutionResult {
        let state = self
            .state
            .map(|s| s.current)
            .unwrap_or(ExecutionState::Created);
        ExecutionResult {
            execution_id: self.id,
            state,
            namespace: self
                .namespace
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            flow_id: self.flow_id.unwrap_or_default(),
            outputs: self.outputs,
        }
    }
}

/// Flow metadata from create/update responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowMetadata {
    pub id: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<u32>,
}
