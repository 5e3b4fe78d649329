//! Flow deployment
//!
//! Kestra has no native upsert, so `deploy` is create-then-update: attempt a
//! create, and when the service reports the flow already exists, recover the
//! flow's identity from the document and retry as an update. Running the same
//! document twice converges to `updated` without the caller pre-checking
//! existence.

pub mod secrets;

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::types::FlowMetadata;
use crate::client::KestraApi;
use crate::error::{DeployError, TransportError};

use self::secrets::SecretStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployStatus {
    Created,
    Updated,
}

impl fmt::Display for DeployStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployStatus::Created => f.write_str("created"),
            DeployStatus::Updated => f.write_str("updated"),
        }
    }
}

/// Result of deploying one flow definition.
#[derive(Debug, Clone, Serialize)]
pub struct DeployOutcome {
    pub status: DeployStatus,
    pub flow: FlowMetadata,
}

/// Per-file outcome from a batch deploy. Files are independent; a failure in
/// one never aborts the rest.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DeployStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<FlowMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    fn deployed(outcome: DeployOutcome) -> Self {
        Self {
            success: true,
            status: Some(outcome.status),
            flow: Some(outcome.flow),
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            status: None,
            flow: None,
            error: Some(error),
        }
    }
}

/// Identity fields a flow document must declare to be updatable.
#[derive(Debug, Deserialize)]
struct FlowHeader {
    id: Option<String>,
    namespace: Option<String>,
}

/// Conflict detection lives in one place: the typed status code decides when
/// available, substring matching on the remote error text is the last resort.
pub fn is_conflict(error: &TransportError) -> bool {
    match error {
        TransportError::Status { status: 409, .. } => true,
        TransportError::Status { body, .. } => body_mentions_conflict(body),
        _ => false,
    }
}

fn body_mentions_conflict(body: &str) -> bool {
    let body = body.to_lowercase();
    body.contains("already exists") || body.contains("conflict") || body.contains("409")
}

pub struct FlowDeployer<A> {
    api: Arc<A>,
    secrets: SecretStore,
    default_namespace: String,
}

impl<A: KestraApi> FlowDeployer<A> {
    pub fn new(api: Arc<A>, secrets: SecretStore, default_namespace: impl Into<String>) -> Self {
        Self {
            api,
            secrets,
            default_namespace: default_namespace.into(),
        }
    }

    /// Deploy or update a flow from its YAML source.
    pub async fn deploy(&self, source: &str) -> Result<DeployOutcome, DeployError> {
        let source = self.secrets.substitute(source);

        match self.api.create_flow(&source).await {
            Ok(flow) => {
                info!(flow_id = %flow.id, namespace = %flow.namespace, "flow created");
                Ok(DeployOutcome {
                    status: DeployStatus::Created,
                    flow,
                })
            }
            Err(error) if is_conflict(&error) => {
                let (id, namespace) = self.flow_identity(&source)?;
                let flow = self
                    .api
                    .update_flow(&namespace, &id, &source)
                    .await
                    .map_err(DeployError::Rejected)?;
                info!(flow_id = %flow.id, namespace = %flow.namespace, "flow updated");
                Ok(DeployOutcome {
                    status: DeployStatus::Updated,
                    flow,
                })
            }
            Err(error) => Err(DeployError::Rejected(error)),
        }
    }

    /// Deploy every `.yml`/`.yaml` file in `directory` (non-recursive). Each
    /// file gets its own outcome; order across files is unspecified.
    pub async fn deploy_all(
        &self,
        directory: impl AsRef<Path>,
    ) -> Result<HashMap<String, FileOutcome>, DeployError> {
        let directory = directory.as_ref();
        let entries = std::fs::read_dir(directory).map_err(|source| DeployError::Directory {
            path: directory.display().to_string(),
            source,
        })?;

        let mut outcomes = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|source| DeployError::Directory {
                path: directory.display().to_string(),
                source,
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let ext = path.extension().and_then(|e| e.to_str());
            if ext != Some("yml") && ext != Some("yaml") {
                continue;
            }

            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();

            let outcome = match std::fs::read_to_string(&path) {
                Ok(source) => match self.deploy(&source).await {
                    Ok(deployed) => FileOutcome::deployed(deployed),
                    Err(error) => {
                        warn!(file = %name, %error, "flow deploy failed");
                        FileOutcome::failed(error.to_string())
                    }
                },
                Err(error) => {
                    warn!(file = %name, %error, "flow file unreadable");
                    FileOutcome::failed(format!("failed to read {}: {}", path.display(), error))
                }
            };
            outcomes.insert(name, outcome);
        }

        Ok(outcomes)
    }

    fn flow_identity(&self, source: &str) -> Result<(String, String), DeployError> {
        let header: FlowHeader = serde_yaml::from_str(source)?;
        let id = header.id.filter(|id| !id.is_empty()).ok_or(DeployError::MissingId)?;
        let namespace = header
            .namespace
            .unwrap_or_else(|| self.default_namespace.clone());
        Ok((id, namespace))
    }
}
