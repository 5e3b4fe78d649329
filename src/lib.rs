//! # Agri-Link Kestra Client
//!
//! Client facade over a Kestra workflow-orchestration server for the
//! Agri-Link flows: crop sales, crisis-shield diversion, and market
//! monitoring.
//!
//! ## Features
//!
//! - **Idempotent deployment** - create-then-update semantics for flow
//!   definitions, with credential substitution before transmission
//! - **Typed triggers** - one execution primitive, three named workflows
//! - **Lifecycle following** - server-push event stream with automatic
//!   polling fallback and deadline enforcement
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use agrilink_kestra::{AgriLinkClient, SaleRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = AgriLinkClient::from_env()?;
//!
//!     let execution = client.start_sale(SaleRequest::new("farmer_123")).await?;
//!     println!("started execution {}", execution.execution_id);
//!
//!     let result = client
//!         .wait_until_terminal(&execution.execution_id, Duration::from_secs(300))
//!         .await?;
//!     println!("finished with state {}", result.state);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod deploy;
pub mod error;
pub mod execution;
pub mod follow;
pub mod trigger;

// Re-export main types
pub use client::http::KestraHttpClient;
pub use client::{AgriLinkClient, ExecutionEventStream, KestraApi};
pub use config::{
    Auth, KestraConfig, DEFAULT_NAMESPACE, FLOW_CRISIS_SHIELD, FLOW_MAIN_SALE,
    FLOW_MARKET_MONITOR, FLOW_NEGOTIATION,
};
pub use deploy::secrets::SecretStore;
pub use deploy::{DeployOutcome, DeployStatus, FileOutcome, FlowDeployer};
pub use error::{DeployError, FollowError, TransportError, TriggerError};
pub use execution::{ExecutionResult, ExecutionState};
pub use follow::{ExecutionFeed, ExecutionFollower, DEFAULT_POLL_INTERVAL};
pub use trigger::{CrisisRequest, ExecutionTrigger, MarketMonitorRequest, SaleRequest};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::client::{AgriLinkClient, KestraApi};
    pub use crate::config::{Auth, KestraConfig};
    pub use crate::deploy::{DeployStatus, FlowDeployer};
    pub use crate::error::{DeployError, FollowError, TriggerError};
    pub use crate::execution::{ExecutionResult, ExecutionState};
    pub use crate::follow::{ExecutionFeed, ExecutionFollower};
    pub use crate::trigger::{CrisisRequest, MarketMonitorRequest, SaleRequest};
}
