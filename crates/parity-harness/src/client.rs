//! JSON-RPC client for parity runs

use reqwest::{Client, Response, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, trace};

use crate::error::{HarnessError, HarnessResult};

/// JSON-RPC client that can talk to either the full node or the secondary server
#[derive(Clone)]
pub struct RpcClient {
    client: Client,
    url: String,
    name: String,
}

/// Response from an RPC call, capturing everything we need to compare
#[derive(Debug, Clone)]
pub struct RpcResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
    pub raw_body: String,
}

impl RpcClient {
    /// Create a client for the full node
    pub fn full_node(url: &str, timeout: Duration) -> HarnessResult<Self> {
        Self::new("full node", url, timeout)
    }

    /// Create a client for the secondary server
    pub fn secondary(url: &str, timeout: Duration) -> HarnessResult<Self> {
        Self::new("secondary", url, timeout)
    }

    fn new(name: &str, url: &str, timeout: Duration) -> HarnessResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| HarnessError::Http {
                server: name.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            name: name.to_string(),
        })
    }

    /// Get the client name (for logging)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send `{"method": method, "params": [params]}`
    pub async fn request(&self, method: &str, params: Value) -> HarnessResult<RpcResponse> {
        let envelope = json!({
            "method": method,
            "params": [params],
        });
        trace!(server = %self.name, request = %envelope, "Sending request");

        let response = self
            .client
            .post(&self.url)
            .json(&envelope)
            .send()
            .await
            .map_err(|source| self.http_error(source))?;

        let response = self.parse_response(response).await?;
        debug!(server = %self.name, method, status = %response.status, "Received response");
        Ok(response)
    }

    /// Send a request and return its `result` object, failing on RPC errors
    pub async fn result(&self, method: &str, params: Value) -> HarnessResult<Value> {
        let response = self.request(method, params).await?;

        if let Some(error) = response.error() {
            return Err(HarnessError::Rpc {
                server: self.name.clone(),
                method: method.to_string(),
                error: error.to_string(),
            });
        }

        response
            .result()
            .cloned()
            .ok_or_else(|| HarnessError::MissingResult {
                server: self.name.clone(),
                method: method.to_string(),
            })
    }

    async fn parse_response(&self, response: Response) -> HarnessResult<RpcResponse> {
        let status = response.status();
        let raw_body = response
            .text()
            .await
            .map_err(|source| self.http_error(source))?;
        let body = serde_json::from_str(&raw_body).ok();

        Ok(RpcResponse {
            status,
            body,
            raw_body,
        })
    }

    fn http_error(&self, source: reqwest::Error) -> HarnessError {
        HarnessError::Http {
            server: self.name.clone(),
            source,
        }
    }

    /// Check if the server answers `server_info` successfully
    pub async fn is_healthy(&self) -> bool {
        match self.request("server_info", json!({})).await {
            Ok(response) => response.is_success() && response.error().is_none(),
            Err(_) => false,
        }
    }

    /// Wait for the server to become healthy
    pub async fn wait_for_healthy(&self, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        let check_interval = Duration::from_millis(500);

        while start.elapsed() < timeout {
            if self.is_healthy().await {
                return true;
            }
            tokio::time::sleep(check_interval).await;
        }

        false
    }
}

impl RpcResponse {
    /// Check if the HTTP status indicates success
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The `result` object, if the body was JSON and had one
    pub fn result(&self) -> Option<&Value> {
        self.body.as_ref()?.get("result")
    }

    /// The RPC error token (`result.error`), if the call failed
    pub fn error(&self) -> Option<&str> {
        let result = self.result()?;
        if result.get("status").and_then(Value::as_str) == Some("success") {
            return None;
        }
        result.get("error").and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: Value) -> RpcResponse {
        RpcResponse {
            status: StatusCode::OK,
            raw_body: body.to_string(),
            body: Some(body),
        }
    }

    #[test]
    fn test_result_and_error() {
        let ok = response(json!({"result": {"status": "success", "ledger_index": 3}}));
        assert_eq!(ok.result().unwrap()["ledger_index"], 3);
        assert!(ok.error().is_none());

        let err = response(json!({"result": {"status": "error", "error": "actNotFound"}}));
        assert_eq!(err.error(), Some("actNotFound"));
    }

    #[test]
    fn test_non_json_body() {
        let resp = RpcResponse {
            status: StatusCode::BAD_GATEWAY,
            body: None,
            raw_body: "<html>".to_string(),
        };
        assert!(!resp.is_success());
        assert!(resp.result().is_none());
        assert!(resp.error().is_none());
    }

    #[test]
    fn test_url_is_normalized() {
        let client =
            RpcClient::secondary("http://localhost:51233/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url, "http://localhost:51233");
        assert_eq!(client.name(), "secondary");
    }
}
