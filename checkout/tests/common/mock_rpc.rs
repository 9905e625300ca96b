//! Mock JSON-RPC endpoint for integration testing
//!
//! Stands in for a node or a wallet that signs `eth_sendTransaction` itself.
//! Every reply echoes the request id so alloy can match it.

use alloy::primitives::U256;
use serde_json::{json, Value};
use wiremock::{
    matchers::{body_partial_json, method},
    Mock, MockServer, Request, Respond, ResponseTemplate,
};

/// Reply with a result or an error payload for one RPC method
#[derive(Debug, Clone)]
pub enum RpcReply {
    Result(Value),
    Error { code: i64, message: String },
}

impl Respond for RpcReply {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let id = request
            .body_json::<Value>()
            .ok()
            .and_then(|body| body.get("id").cloned())
            .unwrap_or(Value::Null);

        let body = match self {
            RpcReply::Result(result) => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": result,
            }),
            RpcReply::Error { code, message } => json!({
                "jsonrpc": "2.0",
                "id": id,
                "error": { "code": code, "message": message },
            }),
        };

        ResponseTemplate::new(200).set_body_json(body)
    }
}

/// Mock RPC server
pub struct MockRpc {
    server: MockServer,
}

impl MockRpc {
    /// Start a new mock RPC server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Answer `rpc_method` with `reply`
    pub async fn mock_method(&self, rpc_method: &str, reply: RpcReply) {
        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "method": rpc_method })))
            .respond_with(reply)
            .mount(&self.server)
            .await;
    }

    /// Answer every `eth_call` with one ABI-encoded uint256
    pub async fn mock_call_uint(&self, value: U256) {
        let encoded = format!("0x{}", hex::encode(value.to_be_bytes::<32>()));
        self.mock_method("eth_call", RpcReply::Result(Value::String(encoded)))
            .await;
    }

    /// Accept every `eth_sendTransaction` with `tx_hash`
    pub async fn mock_send_ok(&self, tx_hash: &str) {
        self.mock_method(
            "eth_sendTransaction",
            RpcReply::Result(Value::String(tx_hash.to_string())),
        )
        .await;
    }

    /// Fail every `eth_sendTransaction` with a JSON-RPC error
    pub async fn mock_send_error(&self, code: i64, message: &str) {
        self.mock_method(
            "eth_sendTransaction",
            RpcReply::Error {
                code,
                message: message.to_string(),
            },
        )
        .await;
    }

    /// Mine every sent transaction as `tx_hash` with the given receipt status.
    ///
    /// Also answers the block number polling alloy runs while it waits.
    pub async fn mock_mined(&self, tx_hash: &str, from: &str, to: &str, success: bool) {
        let status = if success { "0x1" } else { "0x0" };
        let receipt = json!({
            "transactionHash": tx_hash,
            "transactionIndex": "0x0",
            "blockHash": format!("0x{}", "ab".repeat(32)),
            "blockNumber": "0x10",
            "from": from,
            "to": to,
            "contractAddress": null,
            "gasUsed": "0xb411",
            "cumulativeGasUsed": "0xb411",
            "effectiveGasPrice": "0x3b9aca00",
            "status": status,
            "type": "0x2",
            "logs": [],
            "logsBloom": format!("0x{}", "00".repeat(256)),
        });

        self.mock_send_ok(tx_hash).await;
        self.mock_method("eth_getTransactionReceipt", RpcReply::Result(receipt))
            .await;
        self.mock_method("eth_blockNumber", RpcReply::Result(json!("0x10")))
            .await;
    }

    /// Parameters of every received call to `rpc_method`
    pub async fn params_of(&self, rpc_method: &str) -> Vec<Value> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .filter_map(|r| r.body_json::<Value>().ok())
            .filter(|body| body["method"] == rpc_method)
            .map(|body| body["params"].clone())
            .collect()
    }
}
