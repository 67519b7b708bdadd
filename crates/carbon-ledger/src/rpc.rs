// crates/carbon-ledger/src/rpc.rs
//
// Minimal Ethereum JSON-RPC 2.0 client over reqwest.
//
// Node errors (a well-formed `error` object) are kept apart from transport
// failures: the former mean the node answered and refused, the latter mean
// we do not know what the node saw.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RpcError {
    /// Connection, timeout, or non-JSON HTTP failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object.
    #[error("node error {code}: {message}")]
    Node { code: i64, message: String },

    /// The node answered but the result had an unexpected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// JSON-RPC client bound to one node endpoint.
#[derive(Debug)]
pub struct JsonRpcClient {
    endpoint: String,
    client: reqwest::Client,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    /// Create a client with a per-request timeout.
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RpcError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Call `method` and decode its `result` as `T`.
    ///
    /// A JSON `null` result decodes into `Option::None` when `T` is an `Option`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        tracing::trace!("RPC -> {} {}", method, request.params);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{} request failed: {}", method, e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RpcError::Transport(format!("{} response read failed: {}", method, e)))?;

        // Some nodes return JSON-RPC errors with a non-2xx status, so try the
        // envelope first and only fall back to the HTTP status.
        let envelope: JsonRpcResponse = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(RpcError::Decode(format!("{} returned invalid JSON: {}", method, e)))
            }
            Err(_) => {
                return Err(RpcError::Transport(format!(
                    "{} failed with HTTP {}: {}",
                    method, status, body
                )))
            }
        };

        if let Some(err) = envelope.error {
            return Err(RpcError::Node {
                code: err.code,
                message: err.message,
            });
        }
        if !status.is_success() {
            return Err(RpcError::Transport(format!("{} failed with HTTP {}", method, status)));
        }

        let result = envelope.result.unwrap_or(serde_json::Value::Null);
        serde_json::from_value(result)
            .map_err(|e| RpcError::Decode(format!("{} result: {}", method, e)))
    }
}

// ---------------------------------------------------------------------------
// Hex quantity helpers
// ---------------------------------------------------------------------------

/// Render a quantity the way JSON-RPC expects it: `0x` + minimal hex.
pub fn quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

pub fn parse_quantity(value: &str) -> Result<u64, RpcError> {
    let digits = strip_hex_prefix(value)?;
    if digits.is_empty() {
        return Err(RpcError::Decode(format!("empty quantity: {:?}", value)));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::Decode(format!("bad quantity {:?}: {}", value, e)))
}

pub fn parse_quantity_u128(value: &str) -> Result<u128, RpcError> {
    let digits = strip_hex_prefix(value)?;
    if digits.is_empty() {
        return Err(RpcError::Decode(format!("empty quantity: {:?}", value)));
    }
    u128::from_str_radix(digits, 16)
        .map_err(|e| RpcError::Decode(format!("bad quantity {:?}: {}", value, e)))
}

/// Decode `0x`-prefixed hex data. `0x` alone is empty data.
pub fn parse_data(value: &str) -> Result<Vec<u8>, RpcError> {
    let digits = strip_hex_prefix(value)?;
    hex::decode(digits).map_err(|e| RpcError::Decode(format!("bad hex data: {}", e)))
}

fn strip_hex_prefix(value: &str) -> Result<&str, RpcError> {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| RpcError::Decode(format!("missing 0x prefix: {:?}", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Helper to start a mock node that answers one request with a fixed response.
    async fn mock_node(status: u16, body: &str) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let endpoint = format!("http://{}", addr);
        let response = format!(
            "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = vec![0u8; 8192];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(response.as_bytes()).await;
            }
        });

        (endpoint, handle)
    }

    fn client(endpoint: &str) -> JsonRpcClient {
        JsonRpcClient::new(endpoint, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn call_decodes_result() {
        let (endpoint, _handle) = mock_node(200, r#"{"jsonrpc":"2.0","id":1,"result":"0x1a4"}"#).await;
        let result: String = client(&endpoint)
            .call("eth_blockNumber", serde_json::json!([]))
            .await
            .unwrap();
        assert_eq!(parse_quantity(&result).unwrap(), 420);
    }

    #[tokio::test]
    async fn null_result_is_none() {
        let (endpoint, _handle) = mock_node(200, r#"{"jsonrpc":"2.0","id":1,"result":null}"#).await;
        let result: Option<serde_json::Value> = client(&endpoint)
            .call("eth_getTransactionReceipt", serde_json::json!(["0x01"]))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn node_error_is_distinguished() {
        let (endpoint, _handle) = mock_node(
            200,
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"nonce too low"}}"#,
        )
        .await;
        let err = client(&endpoint)
            .call::<String>("eth_sendRawTransaction", serde_json::json!(["0x00"]))
            .await
            .unwrap_err();
        match err {
            RpcError::Node { code, message } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "nonce too low");
            }
            other => panic!("Expected node error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn http_failure_without_envelope_is_transport() {
        let (endpoint, _handle) = mock_node(502, "bad gateway").await;
        let err = client(&endpoint)
            .call::<String>("eth_chainId", serde_json::json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[tokio::test]
    async fn connection_error_is_transport() {
        let err = client("http://127.0.0.1:1") // Nothing listening
            .call::<String>("eth_chainId", serde_json::json!([]))
            .await
            .unwrap_err();
        assert!(matches!(err, RpcError::Transport(_)));
    }

    #[test]
    fn test_quantities() {
        assert_eq!(quantity(0), "0x0");
        assert_eq!(quantity(1_000_000), "0xf4240");
        assert_eq!(parse_quantity("0x0").unwrap(), 0);
        assert_eq!(parse_quantity_u128("0x4a817c800").unwrap(), 20_000_000_000);
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("12").is_err());
        assert_eq!(parse_data("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_data("0x0102").unwrap(), vec![1, 2]);
    }
}
