//! Execution triggering
//!
//! One primitive (`trigger`) submits a namespace, flow id, and form-encoded
//! scalar inputs; three named triggers differ only in target flow and input
//! shape. Domain validation is the server's job; the client enforces nothing
//! beyond the type system.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::client::KestraApi;
use crate::config::{FLOW_CRISIS_SHIELD, FLOW_MAIN_SALE, FLOW_MARKET_MONITOR};
use crate::error::TriggerError;
use crate::execution::{ExecutionResult, ExecutionState};

/// Inputs for the main sale workflow: quality assessment, market lookup, then
/// either normal negotiation or crisis diversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleRequest {
    pub farmer_id: String,
    #[serde(default = "defaults::farmer_name")]
    pub farmer_name: String,
    #[serde(default = "defaults::farmer_phone")]
    pub farmer_phone: String,
    #[serde(default = "defaults::commodity")]
    pub commodity: String,
    #[serde(default = "defaults::quantity_kg")]
    pub quantity_kg: u32,
    #[serde(default = "defaults::state")]
    pub state: String,
    #[serde(default = "defaults::district")]
    pub district: String,
    #[serde(default)]
    pub crop_image_url: String,
    #[serde(default = "defaults::cost_of_production")]
    pub cost_of_production: u32,
    #[serde(default)]
    pub wait: bool,
}

impl SaleRequest {
    pub fn new(farmer_id: impl Into<String>) -> Self {
        Self {
            farmer_id: farmer_id.into(),
            farmer_name: defaults::farmer_name(),
            farmer_phone: defaults::farmer_phone(),
            commodity: defaults::commodity(),
            quantity_kg: defaults::quantity_kg(),
            state: defaults::state(),
            district: defaults::district(),
            crop_image_url: String::new(),
            cost_of_production: defaults::cost_of_production(),
            wait: false,
        }
    }

    fn into_inputs(self) -> Vec<(String, String)> {
        vec![
            ("farmer_id".to_string(), self.farmer_id),
            ("farmer_name".to_string(), self.farmer_name),
            ("farmer_phone".to_string(), self.farmer_phone),
            ("commodity".to_string(), self.commodity),
            ("quantity_kg".to_string(), self.quantity_kg.to_string()),
            ("state".to_string(), self.state),
            ("district".to_string(), self.district),
            ("crop_image_url".to_string(), self.crop_image_url),
            (
                "cost_of_production".to_string(),
                self.cost_of_production.to_string(),
            ),
        ]
    }
}

/// Inputs for direct crisis-shield activation, used when market prices have
/// crashed and immediate diversion is needed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrisisRequest {
    pub farmer_id: String,
    pub commodity: String,
    pub quantity_kg: u32,
    pub state: String,
    pub district: String,
    #[serde(default = "defaults::quality_grade")]
    pub quality_grade: String,
    #[serde(default)]
    pub wait: bool,
}

impl CrisisRequest {
    fn into_inputs(self) -> Vec<(String, String)> {
        vec![
            ("farmer_id".to_string(), self.farmer_id),
            ("commodity".to_string(), self.commodity),
            ("quantity_kg".to_string(), self.quantity_kg.to_string()),
            ("state".to_string(), self.state),
            ("district".to_string(), self.district),
            ("quality_grade".to_string(), self.quality_grade),
        ]
    }
}

/// Inputs for the market monitoring workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMonitorRequest {
    /// Comma-separated commodity list, passed through verbatim.
    #[serde(default = "defaults::commodities")]
    pub commodities: String,
    #[serde(default = "defaults::state")]
    pub state: String,
    #[serde(default)]
    pub wait: bool,
}

impl Default for MarketMonitorRequest {
    fn default() -> Self {
        Self {
            commodities: defaults::commodities(),
            state: defaults::state(),
            wait: false,
        }
    }
}

impl MarketMonitorRequest {
    fn into_inputs(self) -> Vec<(String, String)> {
        vec![
            ("commodities".to_string(), self.commodities),
            ("state".to_string(), self.state),
        ]
    }
}

mod defaults {
    pub fn farmer_name() -> String {
        "Farmer".to_string()
    }
    pub fn farmer_phone() -> String {
        "+919999999999".to_string()
    }
    pub fn commodity() -> String {
        "Tomato".to_string()
    }
    pub fn quantity_kg() -> u32 {
        100
    }
    pub fn state() -> String {
        "Maharashtra".to_string()
    }
    pub fn district() -> String {
        "Nashik".to_string()
    }
    pub fn cost_of_production() -> u32 {
        800
    }
    pub fn quality_grade() -> String {
        r#"{"grade": "B"}"#.to_string()
    }
    pub fn commodities() -> String {
        "Tomato,Potato,Onion".to_string()
    }
}

pub struct ExecutionTrigger<A> {
    api: Arc<A>,
    namespace: String,
}

impl<A: KestraApi> ExecutionTrigger<A> {
    pub fn new(api: Arc<A>, namespace: impl Into<String>) -> Self {
        Self {
            api,
            namespace: namespace.into(),
        }
    }

    /// Trigger one execution. With `wait`, the service blocks the call until
    /// the execution is terminal; the client never polls in that path.
    pub async fn trigger(
        &self,
        flow_id: &str,
        inputs: Vec<(String, String)>,
        wait: bool,
    ) -> Result<ExecutionResult, TriggerError> {
        let dto = self
            .api
            .create_execution(&self.namespace, flow_id, &inputs, wait)
            .await
            .map_err(|source| TriggerError {
                namespace: self.namespace.clone(),
                flow_id: flow_id.to_string(),
                source,
            })?;

        // Identity comes from the trigger itself, not the response; state and
        // outputs default when the response omits them.
        Ok(ExecutionResult {
            execution_id: dto.id,
            state: dto
                .state
                .map(|s| s.current)
                .unwrap_or(ExecutionState::Created),
            namespace: self.namespace.clone(),
            flow_id: flow_id.to_string(),
            outputs: dto.outputs,
        })
    }

    pub async fn start_sale(&self, request: SaleRequest) -> Result<ExecutionResult, TriggerError> {
        let wait = request.wait;
        self.trigger(FLOW_MAIN_SALE, request.into_inputs(), wait).await
    }

    pub async fn start_crisis_shield(
        &self,
        request: CrisisRequest,
    ) -> Result<ExecutionResult, TriggerError> {
        let wait = request.wait;
        self.trigger(FLOW_CRISIS_SHIELD, request.into_inputs(), wait)
            .await
    }

    pub async fn start_market_monitor(
        &self,
        request: MarketMonitorRequest,
    ) -> Result<ExecutionResult, TriggerError> {
        let wait = request.wait;
        self.trigger(FLOW_MARKET_MONITOR, request.into_inputs(), wait)
            .await
    }
}
