//! Stacks 节点 / Hiro API 客户端
//!
//! 原生 STX 余额、nonce、费率与广播走节点 `/v2` 接口，
//! 交易状态走 `/extended/v1/tx`。Stacks 没有 EVM 式合约调用，
//! `call` / `estimate_gas` 返回 NotSupported。

use std::time::Duration;

use async_trait::async_trait;
use ethers::types::U256;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::{
    config::HttpClientConfig,
    domain::{BridgeTransactionStatus, ReceiptStatus, TransactionReceipt},
    error::{ProviderError, ProviderResult},
    infrastructure::rpc_validator,
    service::ledger_client::{CallRequest, LedgerClient},
};

#[derive(Debug, Deserialize)]
struct AccountInfo {
    /// 0x 前缀的 128 位十六进制
    balance: String,
    nonce: u64,
}

#[derive(Debug, Deserialize)]
struct TxRecord {
    tx_id: Option<String>,
    tx_status: String,
    block_height: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct BroadcastRejection {
    error: Option<String>,
    reason: Option<String>,
}

pub struct StacksApiClient {
    http_client: reqwest::Client,
    api_url: String,
}

fn normalize_txid(txid: &str) -> String {
    let trimmed = txid.trim().trim_matches('"').trim_start_matches("0x");
    format!("0x{}", trimmed.to_lowercase())
}

/// `tx_status` → 桥状态
pub fn map_tx_status(tx_status: &str) -> BridgeTransactionStatus {
    match tx_status {
        "success" | "success_anchor_block_found" => BridgeTransactionStatus::Completed,
        "pending" | "pending_anchor_block" => BridgeTransactionStatus::Pending,
        s if s.starts_with("abort_") => BridgeTransactionStatus::Canceled,
        _ => BridgeTransactionStatus::NotFound,
    }
}

impl StacksApiClient {
    pub fn new(api_url: impl Into<String>, http: &HttpClientConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(http.request_timeout_secs))
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .build()
            .map_err(|e| ProviderError::network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client: client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> ProviderResult<T> {
        let response = self
            .http_client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| ProviderError::from(e).context(path))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::network_status(
                status.as_u16(),
                format!("GET {} failed with status {}: {}", path, status, body),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from(e).context(path))?;
        serde_json::from_str(&body).map_err(|e| ProviderError::from(e).context(path))
    }

    /// 查询交易记录；404 视为不存在
    async fn fetch_tx(&self, txid: &str) -> ProviderResult<Option<TxRecord>> {
        let path = format!("/extended/v1/tx/{}", normalize_txid(txid));
        let response = self
            .http_client
            .get(self.url(&path))
            .send()
            .await
            .map_err(|e| ProviderError::from(e).context(&path))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::network_status(
                status.as_u16(),
                format!("GET {} failed with status {}: {}", path, status, body),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from(e).context(&path))?;
        let record: TxRecord =
            serde_json::from_str(&body).map_err(|e| ProviderError::from(e).context(&path))?;
        Ok(Some(record))
    }

}

#[async_trait]
impl LedgerClient for StacksApiClient {
    async fn ping(&self) -> ProviderResult<()> {
        let info: serde_json::Value = self.get_json("/v2/info").await?;
        tracing::debug!(
            endpoint = %self.api_url,
            network_id = ?info.get("network_id"),
            "Stacks node reachable"
        );
        Ok(())
    }

    async fn get_balance(&self, address: &str) -> ProviderResult<U256> {
        let account: AccountInfo = self
            .get_json(&format!("/v2/accounts/{}?proof=0", address))
            .await?;
        rpc_validator::validate_balance(&account.balance)
            .map_err(|e| ProviderError::deserialization(format!("{:#}", e)))
    }

    async fn get_nonce(&self, address: &str) -> ProviderResult<u64> {
        let account: AccountInfo = self
            .get_json(&format!("/v2/accounts/{}?proof=0", address))
            .await?;
        Ok(account.nonce)
    }

    async fn gas_price(&self) -> ProviderResult<U256> {
        let rate: u64 = self.get_json("/v2/fees/transfer").await?;
        Ok(U256::from(rate))
    }

    async fn broadcast(&self, signed_tx: &[u8]) -> ProviderResult<String> {
        let response = self
            .http_client
            .post(self.url("/v2/transactions"))
            .header("Content-Type", "application/octet-stream")
            .body(signed_tx.to_vec())
            .send()
            .await
            .map_err(|e| ProviderError::from(e).context("broadcast"))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::from(e).context("broadcast"))?;

        if !status.is_success() {
            let detail = serde_json::from_str::<BroadcastRejection>(&body)
                .ok()
                .map(|r| {
                    format!(
                        "{} ({})",
                        r.error.unwrap_or_default(),
                        r.reason.unwrap_or_default()
                    )
                })
                .unwrap_or(body);
            tracing::warn!(status = status.as_u16(), detail = %detail, "Stacks broadcast rejected");
            return Err(ProviderError::network_status(
                status.as_u16(),
                format!("Broadcast rejected with status {}: {}", status, detail),
            ));
        }

        let txid: String = serde_json::from_str(&body).unwrap_or(body);
        let tx_hash = rpc_validator::validate_tx_hash(&txid)
            .map_err(|e| ProviderError::deserialization(format!("{:#}", e)))?;
        tracing::info!(tx_hash = %tx_hash, endpoint = %self.api_url, "Stacks transaction broadcast");
        Ok(tx_hash)
    }

    async fn get_receipt(&self, tx_hash: &str) -> ProviderResult<Option<TransactionReceipt>> {
        let Some(record) = self.fetch_tx(tx_hash).await? else {
            return Ok(None);
        };

        let status = match map_tx_status(&record.tx_status) {
            BridgeTransactionStatus::Completed => ReceiptStatus::Success,
            BridgeTransactionStatus::Canceled => ReceiptStatus::Failed,
            _ => return Ok(None),
        };

        Ok(Some(TransactionReceipt {
            tx_hash: record
                .tx_id
                .map(|id| normalize_txid(&id))
                .unwrap_or_else(|| normalize_txid(tx_hash)),
            status,
            block_number: record.block_height,
            gas_used: None,
        }))
    }

    /// Stacks 专用状态映射，可产生 Pending
    async fn transaction_status(&self, txid: &str) -> ProviderResult<BridgeTransactionStatus> {
        let status = match self.fetch_tx(txid).await? {
            Some(record) => map_tx_status(&record.tx_status),
            None => BridgeTransactionStatus::NotFound,
        };
        tracing::debug!(txid = %txid, status = %status, "Stacks transaction status");
        Ok(status)
    }

    async fn call(&self, _to: &str, _data: &[u8]) -> ProviderResult<Vec<u8>> {
        Err(ProviderError::not_supported(
            "Contract calls are not supported by the Stacks provider",
        ))
    }

    async fn estimate_gas(&self, _call: &CallRequest) -> ProviderResult<U256> {
        Err(ProviderError::not_supported(
            "Gas estimation is not supported by the Stacks provider",
        ))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::{
        matchers::{header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::error::ErrorKind;

    const TXID: &str = "0x9d0b0c2f1c3f7e1a4b5c6d7e8f9a0b1c2d3e4f5a6b7c8d9e0f1a2b3c4d5e6f70";
    const ADDR: &str = "SP2J6ZY48GV1EZ5V2V5RB9MP66SW86PYKKNRV9EJ7";

    fn client_for(server: &MockServer) -> StacksApiClient {
        StacksApiClient::new(server.uri(), &HttpClientConfig::default()).unwrap()
    }

    #[test]
    fn test_map_tx_status() {
        assert_eq!(map_tx_status("success"), BridgeTransactionStatus::Completed);
        assert_eq!(map_tx_status("pending"), BridgeTransactionStatus::Pending);
        assert_eq!(
            map_tx_status("abort_by_post_condition"),
            BridgeTransactionStatus::Canceled
        );
        assert_eq!(map_tx_status("dropped_stale_fee"), BridgeTransactionStatus::NotFound);
    }

    #[tokio::test]
    async fn test_account_balance_and_nonce() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/v2/accounts/{}", ADDR)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "balance": "0x0000000000000000000000003b9aca00",
                "locked": "0x00000000000000000000000000000000",
                "nonce": 4
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.get_balance(ADDR).await.unwrap(), U256::from(1_000_000_000u64));
        assert_eq!(client.get_nonce(ADDR).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_broadcast_returns_txid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/transactions"))
            .and(header("Content-Type", "application/octet-stream"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(TXID.trim_start_matches("0x"))))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.broadcast(&[0x00, 0x01]).await.unwrap(), TXID);
    }

    #[tokio::test]
    async fn test_broadcast_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/transactions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "transaction rejected",
                "reason": "NotEnoughFunds"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.broadcast(&[0x00]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NetworkError);
        assert_eq!(err.status, Some(400));
        assert!(err.message.contains("NotEnoughFunds"));
    }

    #[tokio::test]
    async fn test_receipt_and_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/extended/v1/tx/{}", TXID)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "tx_id": TXID,
                "tx_status": "pending"
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.get_receipt(TXID).await.unwrap().is_none());
        assert_eq!(
            client.transaction_status(TXID).await.unwrap(),
            BridgeTransactionStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_unknown_tx_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(
            client.transaction_status(TXID).await.unwrap(),
            BridgeTransactionStatus::NotFound
        );
        assert!(client.get_receipt(TXID).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_contract_calls_not_supported() {
        let client = StacksApiClient::new("http://localhost:1", &HttpClientConfig::default()).unwrap();
        let err = client.call(ADDR, &[]).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotSupported);
    }
}
