//! Client error types

use std::time::Duration;

/// Transport-level failures from the Kestra HTTP API.
///
/// `Unavailable` is the structural signal the lifecycle follower uses to fall
/// back from the event stream to polling; it is consumed at that boundary and
/// never reaches callers of the public API.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Kestra unavailable: {0}")]
    Unavailable(String),

    #[error("Kestra returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode Kestra response: {0}")]
    Decode(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl TransportError {
    /// Classify a reqwest error structurally rather than by message text.
    pub(crate) fn from_reqwest(error: reqwest::Error) -> Self {
        if error.is_connect() || error.is_timeout() {
            TransportError::Unavailable(error.to_string())
        } else if error.is_decode() {
            TransportError::Decode(error.to_string())
        } else {
            TransportError::Request(error.to_string())
        }
    }
}

/// Errors from deploying a single flow definition.
///
/// A conflict on create is not an error: it is recovered locally by retrying
/// as an update. Everything else surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("flow rejected by Kestra: {0}")]
    Rejected(#[source] TransportError),

    #[error("invalid flow definition: {0}")]
    InvalidDefinition(#[from] serde_yaml::Error),

    #[error("flow definition has no id field")]
    MissingId,

    #[error("failed to read flows directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// The remote service rejected execution creation. Never retried.
#[derive(Debug, thiserror::Error)]
#[error("failed to trigger {namespace}/{flow_id}: {source}")]
pub struct TriggerError {
    pub namespace: String,
    pub flow_id: String,
    #[source]
    pub source: TransportError,
}

/// Errors while following an execution to a terminal state.
#[derive(Debug, thiserror::Error)]
pub enum FollowError {
    /// The deadline elapsed before a terminal state was observed. The
    /// execution itself may still be running on the server.
    #[error("execution {execution_id} did not reach a terminal state within {timeout:?}")]
    Timeout {
        execution_id: String,
        timeout: Duration,
    },

    #[error("failed while following execution {execution_id}: {source}")]
    Transport {
        execution_id: String,
        #[source]
        source: TransportError,
    },
}
