//! Kestra API seam and the Agri-Link client facade
//!
//! `KestraApi` is the trait boundary between the lifecycle components and the
//! transport. Production code uses the reqwest implementation in
//! [`http::KestraHttpClient`]; tests substitute scripted fakes.

pub mod http;
pub mod types;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::KestraConfig;
use crate::deploy::secrets::SecretStore;
use crate::deploy::{DeployOutcome, FileOutcome, FlowDeployer};
use crate::error::{DeployError, FollowError, TransportError, TriggerError};
use crate::execution::ExecutionResult;
use crate::follow::{ExecutionFeed, ExecutionFollower};
use crate::trigger::{CrisisRequest, ExecutionTrigger, MarketMonitorRequest, SaleRequest};

use self::http::KestraHttpClient;
use self::types::{ExecutionDto, FlowMetadata};

/// Server-push sequence of execution events, keepalives already filtered.
pub type ExecutionEventStream = BoxStream<'static, Result<ExecutionDto, TransportError>>;

/// Operations the lifecycle components need from the orchestration service.
#[async_trait]
pub trait KestraApi: Send + Sync {
    async fn create_flow(&self, source: &str) -> Result<FlowMetadata, TransportError>;

    async fn update_flow(
        &self,
        namespace: &str,
        id: &str,
        source: &str,
    ) -> Result<FlowMetadata, TransportError>;

    async fn create_execution(
        &self,
        namespace: &str,
        flow_id: &str,
        inputs: &[(String, String)],
        wait: bool,
    ) -> Result<ExecutionDto, TransportError>;

    async fn get_execution(&self, execution_id: &str) -> Result<ExecutionDto, TransportError>;

    /// Open a long-lived event stream for one execution. Opening fails with
    /// [`TransportError::Unavailable`] when streaming cannot be used at all;
    /// the follower treats that as the signal to poll instead.
    async fn follow_execution(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionEventStream, TransportError>;
}

/// One client for all Agri-Link workflow operations.
///
/// Constructed once at startup from a [`KestraConfig`] and shared for the
/// process lifetime; each call owns its own connection and snapshot, so
/// concurrent calls need no coordination.
pub struct AgriLinkClient {
    config: KestraConfig,
    deployer: FlowDeployer<KestraHttpClient>,
    trigger: ExecutionTrigger<KestraHttpClient>,
    follower: ExecutionFollower<KestraHttpClient>,
}

impl AgriLinkClient {
    pub fn new(config: KestraConfig) -> Result<Self, TransportError> {
        let api = Arc::new(KestraHttpClient::new(config.clone())?);
        Ok(Self {
            deployer: FlowDeployer::new(
                Arc::clone(&api),
                SecretStore::from_env(),
                &config.namespace,
            ),
            trigger: ExecutionTrigger::new(Arc::clone(&api), &config.namespace),
            follower: ExecutionFollower::new(api),
            config,
        })
    }

    pub fn from_env() -> Result<Self, TransportError> {
        Self::new(KestraConfig::from_env())
    }

    pub fn config(&self) -> &KestraConfig {
        &self.config
    }

    /// Override the interval used when the follower polls.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.follower = self.follower.poll_interval(interval);
        self
    }

    /// Deploy or update a single flow definition.
    pub async fn deploy_flow(&self, source: &str) -> Result<DeployOutcome, DeployError> {
        self.deployer.deploy(source).await
    }

    /// Deploy every flow definition in a directory, one outcome per file.
    pub async fn deploy_all_flows(
        &self,
        directory: impl AsRef<Path>,
    ) -> Result<HashMap<String, FileOutcome>, DeployError> {
        self.deployer.deploy_all(directory).await
    }

    pub async fn start_sale(&self, request: SaleRequest) -> Result<ExecutionResult, TriggerError> {
        self.trigger.start_sale(request).await
    }

    pub async fn start_crisis_shield(
        &self,
        request: CrisisRequest,
    ) -> Result<ExecutionResult, TriggerError> {
        self.trigger.start_crisis_shield(request).await
    }

    pub async fn start_market_monitor(
        &self,
        request: MarketMonitorRequest,
    ) -> Result<ExecutionResult, TriggerError> {
        self.trigger.start_market_monitor(request).await
    }

    /// Point-in-time status fetch.
    pub async fn get_execution(&self, execution_id: &str) -> Result<ExecutionResult, FollowError> {
        self.follower.get_execution(execution_id).await
    }

    /// Lazy sequence of state snapshots, streaming-first with poll fallback.
    pub async fn follow(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionFeed<KestraHttpClient>, FollowError> {
        self.follower.follow(execution_id).await
    }

    /// Block until the execution reaches a terminal state or the deadline
    /// elapses.
    pub async fn wait_until_terminal(
        &self,
        execution_id: &str,
        timeout: Duration,
    ) -> Result<ExecutionResult, FollowError> {
        self.follower.wait_until_terminal(execution_id, timeout).await
    }
}
