//! Shared scripted fake for the Kestra API seam.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;

use agrilink_kestra::client::types::{ExecutionDto, FlowMetadata, StateDto};
use agrilink_kestra::client::{ExecutionEventStream, KestraApi};
use agrilink_kestra::{ExecutionState, TransportError};

pub fn flow_meta(id: &str) -> FlowMetadata {
    FlowMetadata {
        id: id.to_string(),
        namespace: "agrilink".to_string(),
        revision: Some(1),
    }
}

pub fn execution(id: &str, state: &str) -> ExecutionDto {
    ExecutionDto {
        id: id.to_string(),
        namespace: Some("agrilink".to_string()),
        flow_id: Some("main-sale-workflow".to_string()),
        state: Some(StateDto {
            current: ExecutionState::from(state.to_string()),
            histories: vec![],
        }),
        outputs: None,
    }
}

/// Execution response with no state field, as returned by a bare create.
pub fn stateless_execution(id: &str) -> ExecutionDto {
    ExecutionDto {
        id: id.to_string(),
        namespace: None,
        flow_id: None,
        state: None,
        outputs: None,
    }
}

#[derive(Debug, Clone)]
pub struct TriggerCall {
    pub namespace: String,
    pub flow_id: String,
    pub inputs: Vec<(String, String)>,
    pub wait: bool,
}

/// Scripted in-memory `KestraApi` with call counters.
///
/// Responses pop from per-operation queues; when a queue is empty a sensible
/// default applies. `stream_script` controls `follow_execution`: `Err` fails
/// the open, `Ok(events)` serves the events, absent means the stream endpoint
/// is unavailable.
#[derive(Default)]
pub struct FakeKestra {
    pub create_flow_responses: Mutex<VecDeque<Result<FlowMetadata, TransportError>>>,
    pub update_flow_responses: Mutex<VecDeque<Result<FlowMetadata, TransportError>>>,
    /// Fail create_flow for any source containing this marker.
    pub fail_create_containing: Mutex<Option<String>>,
    pub last_update: Mutex<Option<(String, String)>>,

    pub trigger_response: Mutex<Option<ExecutionDto>>,
    pub trigger_error: Mutex<Option<TransportError>>,
    pub last_trigger: Mutex<Option<TriggerCall>>,

    pub stream_script: Mutex<Option<Result<Vec<ExecutionDto>, TransportError>>>,
    pub poll_script: Mutex<VecDeque<ExecutionDto>>,
    /// Served for every poll once `poll_script` is exhausted.
    pub poll_repeat: Mutex<Option<ExecutionDto>>,

    pub create_flow_calls: AtomicUsize,
    pub update_flow_calls: AtomicUsize,
    pub create_execution_calls: AtomicUsize,
    pub get_execution_calls: AtomicUsize,
    pub follow_calls: AtomicUsize,
    pub stream_events_served: Arc<AtomicUsize>,
}

#[async_trait]
impl KestraApi for FakeKestra {
    async fn create_flow(&self, source: &str) -> Result<FlowMetadata, TransportError> {
        self.create_flow_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(marker) = self.fail_create_containing.lock().unwrap().clone() {
            if source.contains(&marker) {
                return Err(TransportError::Status {
                    status: 500,
                    body: format!("server rejected flow containing {:?}", marker),
                });
            }
        }
        if let Some(response) = self.create_flow_responses.lock().unwrap().pop_front() {
            return response;
        }
        Ok(flow_meta("flow"))
    }

    async fn update_flow(
        &self,
        namespace: &str,
        id: &str,
        _source: &str,
    ) -> Result<FlowMetadata, TransportError> {
        self.update_flow_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_update.lock().unwrap() = Some((namespace.to_string(), id.to_string()));
        if let Some(response) = self.update_flow_responses.lock().unwrap().pop_front() {
            return response;
        }
        Ok(flow_meta(id))
    }

    async fn create_execution(
        &self,
        namespace: &str,
        flow_id: &str,
        inputs: &[(String, String)],
        wait: bool,
    ) -> Result<ExecutionDto, TransportError> {
        self.create_execution_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_trigger.lock().unwrap() = Some(TriggerCall {
            namespace: namespace.to_string(),
            flow_id: flow_id.to_string(),
            inputs: inputs.to_vec(),
            wait,
        });
        if let Some(error) = self.trigger_error.lock().unwrap().take() {
            return Err(error);
        }
        match self.trigger_response.lock().unwrap().clone() {
            Some(dto) => Ok(dto),
            None => Ok(stateless_execution("exec-1")),
        }
    }

    async fn get_execution(&self, execution_id: &str) -> Result<ExecutionDto, TransportError> {
        self.get_execution_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(dto) = self.poll_script.lock().unwrap().pop_front() {
            return Ok(dto);
        }
        if let Some(dto) = self.poll_repeat.lock().unwrap().clone() {
            return Ok(dto);
        }
        Err(TransportError::Status {
            status: 404,
            body: format!("execution {} not found", execution_id),
        })
    }

    async fn follow_execution(
        &self,
        _execution_id: &str,
    ) -> Result<ExecutionEventStream, TransportError> {
        self.follow_calls.fetch_add(1, Ordering::SeqCst);
        match self.stream_script.lock().unwrap().take() {
            Some(Ok(events)) => {
                let served = Arc::clone(&self.stream_events_served);
                Ok(futures::stream::iter(events.into_iter().map(Ok))
                    .inspect(move |_| {
                        served.fetch_add(1, Ordering::SeqCst);
                    })
                    .boxed())
            }
            Some(Err(error)) => Err(error),
            None => Err(TransportError::Unavailable(
                "event stream not scripted".to_string(),
            )),
        }
    }
}
