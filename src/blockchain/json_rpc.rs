// src/blockchain/json_rpc.rs
//! Minimal JSON-RPC 2.0 / REST transport with endpoint failover.
//!
//! Endpoints are tried in order; the next one is used on transport errors,
//! HTTP 429, 5xx and unparsable bodies. Nothing is retried on the same
//! endpoint, and the caller's timeout bounds the whole walk.

use crate::api::backoff::ApiErrorType;
use crate::error::ValuationError;
use log::{debug, warn};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// Outcome of one endpoint attempt.
#[derive(Debug)]
pub(crate) enum EndpointFailure {
    /// Worth trying the next endpoint
    Failover(String),
    /// The request itself is wrong; other endpoints would answer the same
    Fatal(String),
}

pub(crate) fn classify_status(status: u16, endpoint: &str) -> EndpointFailure {
    let message = format!("HTTP {} from {}", status, endpoint);
    if ApiErrorType::from_status(status).should_failover() {
        EndpointFailure::Failover(message)
    } else {
        EndpointFailure::Fatal(message)
    }
}

/// Walks `endpoints` in order until one answers or a fatal error occurs.
pub(crate) async fn with_failover<T, F, Fut>(
    label: &str,
    endpoints: &[String],
    mut attempt: F,
) -> Result<T, ValuationError>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<T, EndpointFailure>>,
{
    let mut last_error = format!("no endpoint configured for {}", label);
    for (index, endpoint) in endpoints.iter().enumerate() {
        match attempt(endpoint.clone()).await {
            Ok(value) => {
                if index > 0 {
                    debug!("[{}] backup endpoint #{} answered", label, index);
                }
                return Ok(value);
            }
            Err(EndpointFailure::Fatal(message)) => {
                return Err(ValuationError::RpcError(format!("{}: {}", label, message)));
            }
            Err(EndpointFailure::Failover(message)) => {
                warn!("[{}] endpoint {} failed: {}", label, endpoint, message);
                last_error = message;
            }
        }
    }
    Err(ValuationError::RpcError(format!(
        "{}: all {} endpoint(s) failed, last error: {}",
        label,
        endpoints.len(),
        last_error
    )))
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

impl JsonRpcErrorBody {
    fn is_throttle(&self) -> bool {
        // -32005 is the de-facto "limit exceeded" code of public nodes
        self.code == -32005 || self.message.to_lowercase().contains("rate limit")
    }
}

#[derive(Debug)]
pub struct JsonRpcClient {
    http: Client,
    endpoints: Vec<String>,
    label: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(http: Client, endpoints: Vec<String>, label: impl Into<String>) -> Self {
        Self {
            http,
            endpoints,
            label: label.into(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub async fn call(&self, method: &str, params: Value) -> Result<Value, ValuationError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let label = format!("{} {}", self.label, method);
        let params = &params;
        with_failover(&label, &self.endpoints, move |endpoint| async move {
            self.call_endpoint(&endpoint, id, method, params).await
        })
        .await
    }

    pub async fn call_typed<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, ValuationError> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value).map_err(|e| {
            ValuationError::RpcError(format!("{} {}: unexpected result shape: {}", self.label, method, e))
        })
    }

    async fn call_endpoint(
        &self,
        endpoint: &str,
        id: u64,
        method: &str,
        params: &Value,
    ) -> Result<Value, EndpointFailure> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let response = self
            .http
            .post(endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EndpointFailure::Failover(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), endpoint));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| EndpointFailure::Failover(format!("unreadable body: {}", e)))?;
        interpret_response(body)
    }
}

fn interpret_response(body: JsonRpcResponse) -> Result<Value, EndpointFailure> {
    match (body.result, body.error) {
        (_, Some(error)) if error.is_throttle() => Err(EndpointFailure::Failover(format!(
            "node throttled: {} ({})",
            error.message, error.code
        ))),
        (_, Some(error)) => Err(EndpointFailure::Fatal(format!(
            "node error {}: {}",
            error.code, error.message
        ))),
        (Some(result), None) => Ok(result),
        (None, None) => Ok(Value::Null),
    }
}
