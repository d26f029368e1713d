//! EIP-1193 provider seam and a JSON-RPC-over-HTTP implementation.
//!
//! Everything that talks to a wallet or node goes through
//! [`Eip1193Provider`]: a single `request(method, params)` entry point plus a
//! stream of wallet events (`accountsChanged`, `chainChanged`).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use monad_core::error_handler::{
    ClassifiedError, USER_REJECTED_CODE, UNRECOGNIZED_CHAIN_CODE, classify_provider_error,
};

use crate::rpc_config::RpcConfig;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors any provider may return.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The node or wallet answered with a JSON-RPC error object.
    #[error("RPC error {code}: {message}")]
    Rpc {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    /// The request never produced a JSON-RPC answer.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Provider unavailable: {0}")]
    Unavailable(String),
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        Self::Rpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// EIP-1193 / JSON-RPC error code, when the provider supplied one.
    pub fn code(&self) -> Option<i64> {
        match self {
            Self::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_user_rejection(&self) -> bool {
        self.code() == Some(USER_REJECTED_CODE)
            || classify_provider_error(None, &self.to_string()).kind
                == monad_core::ErrorKind::Cancelled
    }

    pub fn is_unrecognized_chain(&self) -> bool {
        self.code() == Some(UNRECOGNIZED_CHAIN_CODE)
    }

    /// Whether retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Timeout(_))
    }

    /// Whether re-sending `method` after a lost answer is harmless. Anything
    /// that signs, broadcasts or prompts the user is sent at most once.
    pub fn is_retry_safe(method: &str) -> bool {
        !(method.starts_with("wallet_")
            || method.starts_with("personal_")
            || method.starts_with("eth_sign")
            || matches!(
                method,
                "eth_sendTransaction" | "eth_sendRawTransaction" | "eth_requestAccounts"
            ))
    }

    pub fn classify(&self) -> ClassifiedError {
        let message = match self {
            Self::Rpc { message, .. } => message.clone(),
            other => other.to_string(),
        };
        classify_provider_error(self.code(), &message)
    }
}

// ---------------------------------------------------------------------------
// Wallet events
// ---------------------------------------------------------------------------

/// Events an EIP-1193 provider emits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum WalletEvent {
    /// New account list; empty means the wallet disconnected.
    AccountsChanged(Vec<String>),
    /// New chain id as a hex quantity, e.g. `"0x279f"`.
    ChainChanged(String),
    /// The provider lost its connection to every chain.
    Disconnect,
}

impl WalletEvent {
    /// Build an event from its EIP-1193 name and payload. Unknown names or
    /// malformed payloads yield `None`.
    pub fn from_eip1193(name: &str, payload: &Value) -> Option<Self> {
        match name {
            "accountsChanged" => {
                let accounts = payload
                    .as_array()?
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect();
                Some(Self::AccountsChanged(accounts))
            }
            "chainChanged" => payload.as_str().map(|s| Self::ChainChanged(s.to_string())),
            "disconnect" => Some(Self::Disconnect),
            _ => None,
        }
    }
}

/// Fan-out point for wallet events. Every subscriber gets every event sent
/// after it subscribed.
#[derive(Debug, Clone)]
pub struct WalletEventHub {
    tx: broadcast::Sender<WalletEvent>,
}

impl WalletEventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(64);
        Self { tx }
    }

    /// Publish an event. Returns how many listeners received it.
    pub fn emit(&self, event: WalletEvent) -> usize {
        debug!(?event, "wallet event");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for WalletEventHub {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Minimal EIP-1193 surface: requests plus an event stream.
#[async_trait]
pub trait Eip1193Provider: Send + Sync {
    /// Issue a JSON-RPC request and return its `result`.
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError>;

    /// Register a listener for wallet events. Dropping the receiver
    /// deregisters it.
    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;
}

// ---------------------------------------------------------------------------
// JSON-RPC wire types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(method: impl Into<String>, params: Value, id: u64) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            method: method.into(),
            params: if params.is_null() { Value::Array(Vec::new()) } else { params },
            id,
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
    pub id: Option<u64>,
}

impl JsonRpcResponse {
    /// Turn the response into the request's result or a provider error.
    /// A `null` result is a valid answer (e.g. a receipt not mined yet).
    pub fn into_result(self) -> Result<Value, ProviderError> {
        if let Some(err) = self.error {
            return Err(ProviderError::Rpc {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

// ---------------------------------------------------------------------------
// HttpProvider
// ---------------------------------------------------------------------------

/// JSON-RPC over HTTP. Read-only requests are retried on transport failures;
/// an RPC error object is an answer and is returned as-is. Requests that may
/// already have been acted on (see [`ProviderError::is_retry_safe`]) are
/// never retried.
///
/// HTTP endpoints never push wallet events on their own. Owners that learn
/// about account or chain changes (a key store, a CLI command) publish them
/// through [`HttpProvider::events`].
pub struct HttpProvider {
    url: String,
    client: reqwest::Client,
    next_id: AtomicU64,
    timeout: Duration,
    retry_count: u32,
    retry_delay: Duration,
    events: WalletEventHub,
}

impl HttpProvider {
    pub fn new(config: &RpcConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ProviderError::Unavailable(e.to_string()))?;

        Ok(Self {
            url: config.url.clone(),
            client,
            next_id: AtomicU64::new(1),
            timeout: config.timeout(),
            retry_count: config.retry_count,
            retry_delay: config.retry_delay(),
            events: WalletEventHub::new(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn events(&self) -> &WalletEventHub {
        &self.events
    }

    async fn send_once(&self, request: &JsonRpcRequest) -> Result<Value, ProviderError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(self.timeout)
                } else {
                    ProviderError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::Transport(format!("HTTP {status}")));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        body.into_result()
    }
}

#[async_trait]
impl Eip1193Provider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(method, params, id);

        let retries = if ProviderError::is_retry_safe(method) {
            self.retry_count
        } else {
            0
        };

        let mut attempt = 0;
        loop {
            match self.send_once(&request).await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_transient() && attempt < retries => {
                    attempt += 1;
                    warn!(method, attempt, "RPC request failed, retrying: {e}");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn request_serializes_with_empty_params() {
        let req = JsonRpcRequest::new("eth_chainId", Value::Null, 7);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["jsonrpc"], "2.0");
        assert_eq!(json["method"], "eth_chainId");
        assert_eq!(json["params"], json!([]));
        assert_eq!(json["id"], 7);
    }

    #[test]
    fn response_result_is_returned() {
        let resp: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": "0x279f"})).unwrap();
        assert_eq!(resp.into_result().unwrap(), json!("0x279f"));
    }

    #[test]
    fn response_null_result_is_ok() {
        let resp: JsonRpcResponse =
            serde_json::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": null})).unwrap();
        assert_eq!(resp.into_result().unwrap(), Value::Null);
    }

    #[test]
    fn response_error_becomes_rpc_error() {
        let resp: JsonRpcResponse = serde_json::from_value(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": 3, "message": "execution reverted", "data": "0x08c379a0"}
        }))
        .unwrap();

        let err = resp.into_result().unwrap_err();
        assert_eq!(err.code(), Some(3));
        assert!(!err.is_transient());
        assert_eq!(err.classify().kind, monad_core::ErrorKind::Reverted);
    }

    #[test]
    fn user_rejection_detection() {
        assert!(ProviderError::rpc(4001, "User rejected the request.").is_user_rejection());
        assert!(ProviderError::rpc(-32603, "user denied transaction signature").is_user_rejection());
        assert!(!ProviderError::rpc(-32000, "nonce too low").is_user_rejection());
        assert!(ProviderError::rpc(4902, "Unrecognized chain").is_unrecognized_chain());
    }

    #[test]
    fn transient_errors() {
        assert!(ProviderError::Transport("connection reset".into()).is_transient());
        assert!(ProviderError::Timeout(Duration::from_secs(30)).is_transient());
        assert!(!ProviderError::InvalidResponse("bad json".into()).is_transient());
    }

    #[test]
    fn wallet_event_from_eip1193() {
        assert_eq!(
            WalletEvent::from_eip1193("accountsChanged", &json!(["0xabc", "0xdef"])),
            Some(WalletEvent::AccountsChanged(vec!["0xabc".into(), "0xdef".into()]))
        );
        assert_eq!(
            WalletEvent::from_eip1193("accountsChanged", &json!([])),
            Some(WalletEvent::AccountsChanged(vec![]))
        );
        assert_eq!(
            WalletEvent::from_eip1193("chainChanged", &json!("0x279f")),
            Some(WalletEvent::ChainChanged("0x279f".into()))
        );
        assert_eq!(WalletEvent::from_eip1193("chainChanged", &json!(5)), None);
        assert_eq!(WalletEvent::from_eip1193("message", &json!({})), None);
    }

    #[tokio::test]
    async fn hub_fans_out_and_tracks_listeners() {
        let hub = WalletEventHub::new();
        assert_eq!(hub.emit(WalletEvent::Disconnect), 0);

        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.listener_count(), 2);

        hub.emit(WalletEvent::ChainChanged("0x1".into()));
        assert_eq!(a.recv().await.unwrap(), WalletEvent::ChainChanged("0x1".into()));
        assert_eq!(b.recv().await.unwrap(), WalletEvent::ChainChanged("0x1".into()));

        drop(a);
        assert_eq!(hub.listener_count(), 1);
    }

    #[test]
    fn signing_methods_are_not_retry_safe() {
        for method in ["eth_call", "eth_chainId", "eth_accounts", "eth_getTransactionReceipt"] {
            assert!(ProviderError::is_retry_safe(method), "{method}");
        }
        for method in [
            "eth_sendTransaction",
            "eth_sendRawTransaction",
            "eth_requestAccounts",
            "eth_signTypedData_v4",
            "personal_sign",
            "wallet_switchEthereumChain",
        ] {
            assert!(!ProviderError::is_retry_safe(method), "{method}");
        }
    }

    /// A one-request-per-connection JSON-RPC server that answers `"0x1"`.
    /// The first connection is held for `first_delay` before answering.
    async fn slow_first_server(first_delay: Duration) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let deliveries = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&deliveries);
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    let body = read_http_body(&mut socket).await;
                    if n == 0 {
                        tokio::time::sleep(first_delay).await;
                    }
                    let id = serde_json::from_str::<Value>(&body)
                        .ok()
                        .and_then(|v| v["id"].as_u64())
                        .unwrap_or(1);
                    let reply = json!({"jsonrpc": "2.0", "id": id, "result": "0x1"}).to_string();
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                        reply.len()
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        (url, deliveries)
    }

    async fn read_http_body(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return String::new();
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).into_owned();
            if let Some(split) = text.find("\r\n\r\n") {
                let len = text[..split]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        if name.eq_ignore_ascii_case("content-length") {
                            value.trim().parse::<usize>().ok()
                        } else {
                            None
                        }
                    })
                    .unwrap_or(0);
                let start = split + 4;
                if text.len() >= start + len {
                    return text[start..start + len].to_string();
                }
            }
        }
    }

    fn local_config(url: String) -> RpcConfig {
        RpcConfig {
            chain_id: 10143,
            url,
            is_custom: true,
            timeout_secs: 1,
            retry_count: 3,
            retry_delay_ms: 10,
        }
    }

    #[tokio::test]
    async fn send_transaction_is_delivered_once_when_the_answer_is_late() {
        let (url, deliveries) = slow_first_server(Duration::from_secs(3)).await;
        let provider = HttpProvider::new(&local_config(url)).unwrap();

        let err = provider
            .request("eth_sendTransaction", json!([{"from": "0x01", "to": "0x02"}]))
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::Timeout(_)), "{err:?}");
        assert_eq!(deliveries.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn reads_are_retried_after_a_timeout() {
        let (url, deliveries) = slow_first_server(Duration::from_secs(3)).await;
        let provider = HttpProvider::new(&local_config(url)).unwrap();

        let result = provider.request("eth_blockNumber", Value::Null).await.unwrap();
        assert_eq!(result, json!("0x1"));
        assert_eq!(deliveries.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn http_provider_builds_from_config() {
        let store = crate::rpc_config::RpcConfigStore::with_defaults();
        let provider = HttpProvider::new(store.get_rpc(10143).unwrap()).unwrap();
        assert_eq!(provider.url(), "https://testnet-rpc.monad.xyz");
        assert_eq!(provider.events().listener_count(), 0);
        let _rx = provider.subscribe();
        assert_eq!(provider.events().listener_count(), 1);
    }
}
