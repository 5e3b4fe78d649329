//! HTTP transport for the Kestra API
//!
//! Flow bodies travel as YAML text, execution inputs as form-encoded scalar
//! fields, and the follow endpoint is consumed as a server-sent-event stream.
//! All error classification is structural: status codes and reqwest error
//! kinds, never response text.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use tracing::{debug, info};

use super::types::{ExecutionDto, FlowMetadata};
use super::{ExecutionEventStream, KestraApi};
use crate::config::{Auth, KestraConfig};
use crate::error::TransportError;

const YAML_CONTENT_TYPE: &str = "application/x-yaml";

#[derive(Debug, Clone)]
pub struct KestraHttpClient {
    config: KestraConfig,
    client: reqwest::Client,
}

impl KestraHttpClient {
    pub fn new(config: KestraConfig) -> Result<Self, TransportError> {
        // No overall request timeout: follow streams and wait=true triggers
        // are expected to stay open. The follower's deadline bounds waiting.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;
        Ok(Self { config, client })
    }

    fn api_url(&self, path: &str) -> String {
        let host = self.config.host.trim_end_matches('/');
        format!(
            "{}/api/v1/{}/{}",
            host,
            self.config.tenant,
            path.trim_start_matches('/')
        )
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth {
            Auth::Bearer { token } => request.bearer_auth(token),
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, TransportError> {
        let response = self
            .apply_auth(request)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::status_error(response).await)
        }
    }

    async fn status_error(response: reqwest::Response) -> TransportError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        TransportError::Status { status, body }
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TransportError> {
        response
            .json::<T>()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))
    }
}

#[async_trait]
impl KestraApi for KestraHttpClient {
    async fn create_flow(&self, source: &str) -> Result<FlowMetadata, TransportError> {
        let url = self.api_url("flows");
        debug!("POST {}", url);
        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, YAML_CONTENT_TYPE)
            .body(source.to_string());
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn update_flow(
        &self,
        namespace: &str,
        id: &str,
        source: &str,
    ) -> Result<FlowMetadata, TransportError> {
        let url = self.api_url(&format!("flows/{}/{}", namespace, id));
        debug!("PUT {}", url);
        let request = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, YAML_CONTENT_TYPE)
            .body(source.to_string());
        let response = self.send(request).await?;
        Self::decode(response).await
    }

    async fn create_execution(
        &self,
        namespace: &str,
        flow_id: &str,
        inputs: &[(String, String)],
        wait: bool,
    ) -> Result<ExecutionDto, TransportError> {
        let url = self.api_url(&format!("executions/{}/{}", namespace, flow_id));
        debug!("POST {} (wait={})", url, wait);
        let mut request = self.client.post(&url).form(inputs);
        if wait {
            request = request.query(&[("wait", "true")]);
        }
        let response = self.send(request).await?;
        let dto: ExecutionDto = Self::decode(response).await?;
        info!(
            execution_id = %dto.id,
            flow_id,
            "execution created"
        );
        Ok(dto)
    }

    async fn get_execution(&self, execution_id: &str) -> Result<ExecutionDto, TransportError> {
        let url = self.api_url(&format!("executions/{}", execution_id));
        debug!("GET {}", url);
        let response = self.send(self.client.get(&url)).await?;
        Self::decode(response).await
    }

    async fn follow_execution(
        &self,
        execution_id: &str,
    ) -> Result<ExecutionEventStream, TransportError> {
        let url = self.api_url(&format!("executions/{}/follow", execution_id));
        debug!("GET {} (event stream)", url);
        let request = self.client.get(&url).header(ACCEPT, "text/event-stream");
        let response = self
            .apply_auth(request)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        // A server without the follow endpoint means streaming is
        // categorically unavailable, not that this execution is in error.
        if matches!(
            status,
            StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED
        ) {
            return Err(TransportError::Unavailable(format!(
                "follow endpoint returned {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(Self::status_error(response).await);
        }

        Ok(event_stream(response))
    }
}

/// Turn an SSE response body into a stream of execution events, dropping
/// keepalive frames that carry no state payload.
fn event_stream(response: reqwest::Response) -> ExecutionEventStream {
    let bytes = response.bytes_stream();
    futures::stream::try_unfold((bytes, String::new()), |(mut bytes, mut buffer)| async move {
        loop {
            while let Some(boundary) = buffer.find("\n\n") {
                let frame: String = buffer.drain(..boundary + 2).collect();
                if let Some(dto) = parse_event(&frame)? {
                    return Ok(Some((dto, (bytes, buffer))));
                }
            }
            match bytes.next().await {
                Some(chunk) => {
                    let chunk = chunk.map_err(TransportError::from_reqwest)?;
                    buffer.push_str(&String::from_utf8_lossy(&chunk));
                }
                None => return Ok(None),
            }
        }
    })
    .boxed()
}

/// Parse one SSE frame. Returns `None` for comment and keepalive frames.
fn parse_event(frame: &str) -> Result<Option<ExecutionDto>, TransportError> {
    let mut data = String::new();
    for line in frame.lines() {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.trim_start());
        }
    }
    if data.is_empty() {
        return Ok(None);
    }

    let value: serde_json::Value = serde_json::from_str(&data)
        .map_err(|e| TransportError::Decode(format!("invalid follow event: {}", e)))?;
    // Keepalive events carry no state; they never surface to the follower.
    if value.get("state").is_none() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| TransportError::Decode(format!("invalid follow event: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionState;

    fn make_client() -> KestraHttpClient {
        KestraHttpClient::new(KestraConfig::default()).unwrap()
    }

    #[test]
    fn test_api_url() {
        let client = make_client();
        assert_eq!(
            client.api_url("flows"),
            "http://localhost:8080/api/v1/default/flows"
        );
        assert_eq!(
            client.api_url("/executions/abc"),
            "http://localhost:8080/api/v1/default/executions/abc"
        );
    }

    #[test]
    fn test_api_url_with_trailing_slash() {
        let config = KestraConfig::default().host("http://kestra:8080/").tenant("prod");
        let client = KestraHttpClient::new(config).unwrap();
        assert_eq!(
            client.api_url("flows"),
            "http://kestra:8080/api/v1/prod/flows"
        );
    }

    #[test]
    fn test_parse_event_with_state() {
        let frame = "data: {\"id\": \"exec-1\", \"state\": {\"current\": \"RUNNING\"}}\n";
        let dto = parse_event(frame).unwrap().expect("meaningful event");
        assert_eq!(dto.id, "exec-1");
        assert_eq!(dto.current_state(), ExecutionState::Running);
    }

    #[test]
    fn test_parse_event_filters_keepalives() {
        assert!(parse_event("\n").unwrap().is_none());
        assert!(parse_event(": keepalive\n").unwrap().is_none());
        assert!(parse_event("data: {\"id\": \"exec-1\"}\n").unwrap().is_none());
    }

    #[test]
    fn test_parse_event_joins_multiline_data() {
        let frame = "data: {\"id\": \"exec-1\",\ndata: \"state\": {\"current\": \"SUCCESS\"}}\n";
        let dto = parse_event(frame).unwrap().expect("meaningful event");
        assert_eq!(dto.current_state(), ExecutionState::Success);
    }

    #[test]
    fn test_parse_event_bad_json_is_decode_error() {
        let err = parse_event("data: {not json}\n").unwrap_err();
        assert!(matches!(err, TransportError::Decode(_)));
    }
}
