// EVM JSON-RPC 账本客户端
// 单端点、无自动重试：失败立即返回给调用方

use std::time::Duration;

use async_trait::async_trait;
use ethers::types::U256;
use serde_json::{json, Value};

use crate::{
    config::HttpClientConfig,
    domain::{ReceiptStatus, TransactionReceipt},
    error::{ProviderError, ProviderResult},
    infrastructure::rpc_validator,
    service::ledger_client::{CallRequest, LedgerClient},
};

pub struct EvmRpcClient {
    http_client: reqwest::Client,
    rpc_url: String,
}

/// anyhow 校验错误统一视为反序列化失败
fn invalid(err: anyhow::Error) -> ProviderError {
    ProviderError::deserialization(format!("{:#}", err))
}

impl EvmRpcClient {
    pub fn new(rpc_url: impl Into<String>, http: &HttpClientConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.request_timeout_secs))
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client: client,
            rpc_url: rpc_url.into(),
        })
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// 发送 JSON-RPC 请求并返回 `result` 字段
    async fn request(&self, method: &str, params: Value) -> ProviderResult<Value> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        tracing::trace!(method, endpoint = %self.rpc_url, "Sending JSON-RPC request");

        let response = self
            .http_client
            .post(&self.rpc_url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderError::from(e).context(method))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from(e).context(method))?;

        if !status.is_success() {
            tracing::warn!(method, status = status.as_u16(), "RPC request failed");
            return Err(ProviderError::network_status(
                status.as_u16(),
                format!("{}: RPC request failed with status {}: {}", method, status, body),
            ));
        }

        let mut json: Value = serde_json::from_str(&body)
            .map_err(|e| ProviderError::from(e).context(method))?;

        // JSON-RPC error 属于节点拒绝，按网络错误处理
        if json.get("error").filter(|e| !e.is_null()).is_some() {
            let err = rpc_validator::validate_rpc_response(&json)
                .err()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown RPC error".to_string());
            tracing::warn!(method, error = %err, "RPC returned error");
            return Err(ProviderError::network(format!("{}: {}", method, err)));
        }

        rpc_validator::validate_rpc_response(&json)
            .map_err(|e| invalid(e.context(format!("{}: invalid response", method))))?;

        Ok(json
            .get_mut("result")
            .map(Value::take)
            .unwrap_or(Value::Null))
    }

    async fn request_str(&self, method: &str, params: Value) -> ProviderResult<String> {
        match self.request(method, params).await? {
            Value::String(s) => Ok(s),
            other => Err(ProviderError::deserialization(format!(
                "{}: expected string result, got {}",
                method, other
            ))),
        }
    }

    pub async fn chain_id(&self) -> ProviderResult<u64> {
        let hex = self.request_str("eth_chainId", json!([])).await?;
        rpc_validator::validate_nonce(&hex).map_err(invalid)
    }
}

fn parse_receipt(tx_hash: &str, value: &Value) -> ProviderResult<TransactionReceipt> {
    let status_hex = value
        .get("status")
        .and_then(Value::as_str)
        .ok_or_else(|| ProviderError::deserialization("Receipt missing status field"))?;

    let status = match rpc_validator::validate_nonce(status_hex).map_err(invalid)? {
        1 => ReceiptStatus::Success,
        _ => ReceiptStatus::Failed,
    };

    let block_number = value
        .get("blockNumber")
        .and_then(Value::as_str)
        .map(rpc_validator::validate_nonce)
        .transpose()
        .map_err(invalid)?;

    let gas_used = value
        .get("gasUsed")
        .and_then(Value::as_str)
        .map(rpc_validator::validate_quantity)
        .transpose()
        .map_err(invalid)?;

    let hash = value
        .get("transactionHash")
        .and_then(Value::as_str)
        .unwrap_or(tx_hash);

    Ok(TransactionReceipt {
        tx_hash: hash.to_string(),
        status,
        block_number,
        gas_used,
    })
}

#[async_trait]
impl LedgerClient for EvmRpcClient {
    async fn ping(&self) -> ProviderResult<()> {
        let chain_id = self.chain_id().await?;
        tracing::debug!(endpoint = %self.rpc_url, chain_id, "EVM endpoint reachable");
        Ok(())
    }

    async fn get_balance(&self, address: &str) -> ProviderResult<U256> {
        let hex = self
            .request_str("eth_getBalance", json!([address, "latest"]))
            .await?;
        rpc_validator::validate_balance(&hex).map_err(invalid)
    }

    async fn get_nonce(&self, address: &str) -> ProviderResult<u64> {
        let hex = self
            .request_str("eth_getTransactionCount", json!([address, "pending"]))
            .await?;
        rpc_validator::validate_nonce(&hex).map_err(invalid)
    }

    async fn gas_price(&self) -> ProviderResult<U256> {
        let hex = self.request_str("eth_gasPrice", json!([])).await?;
        rpc_validator::validate_quantity(&hex).map_err(invalid)
    }

    async fn broadcast(&self, signed_tx: &[u8]) -> ProviderResult<String> {
        let raw = format!("0x{}", hex::encode(signed_tx));
        let hash = self
            .request_str("eth_sendRawTransaction", json!([raw]))
            .await?;
        let tx_hash = rpc_validator::validate_tx_hash(&hash).map_err(invalid)?;
        tracing::info!(tx_hash = %tx_hash, endpoint = %self.rpc_url, "EVM transaction broadcast");
        Ok(tx_hash)
    }

    async fn get_receipt(&self, tx_hash: &str) -> ProviderResult<Option<TransactionReceipt>> {
        let result = self
            .request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        parse_receipt(tx_hash, &result).map(Some)
    }

    async fn call(&self, to: &str, data: &[u8]) -> ProviderResult<Vec<u8>> {
        let call = json!({
            "to": to,
            "data": format!("0x{}", hex::encode(data)),
        });
        let hex = self.request_str("eth_call", json!([call, "latest"])).await?;
        rpc_validator::validate_data(&hex).map_err(invalid)
    }

    async fn estimate_gas(&self, call: &CallRequest) -> ProviderResult<U256> {
        let mut tx = json!({
            "to": call.to,
            "data": format!("0x{}", hex::encode(&call.data)),
            "value": format!("{:#x}", call.value),
        });
        if let Some(from) = &call.from {
            tx["from"] = json!(from);
        }
        let hex = self.request_str("eth_estimateGas", json!([tx])).await?;
        rpc_validator::validate_gas(&hex).map_err(invalid)
    }
}
