//! 账本 RPC 客户端接口
//!
//! 核心逻辑只依赖这一窄接口，具体链（EVM JSON-RPC / Stacks API）各自实现。

use std::time::Duration;

use async_trait::async_trait;
use ethers::types::U256;

use crate::{
    config::ReceiptPollConfig,
    domain::{BridgeTransactionStatus, TransactionReceipt},
    error::{ProviderError, ProviderResult},
};

/// 只读估算调用
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<String>,
    pub to: String,
    pub data: Vec<u8>,
    pub value: U256,
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// 可达性检查（激活时调用）
    async fn ping(&self) -> ProviderResult<()>;

    /// 最小单位余额
    async fn get_balance(&self, address: &str) -> ProviderResult<U256>;

    /// 下一个可用 nonce
    async fn get_nonce(&self, address: &str) -> ProviderResult<u64>;

    /// 当前 gas price（Stacks 为每字节费率）
    async fn gas_price(&self) -> ProviderResult<U256>;

    /// 广播已签名交易，返回交易哈希
    async fn broadcast(&self, signed_tx: &[u8]) -> ProviderResult<String>;

    /// 回执；未上链或不存在返回 None
    async fn get_receipt(&self, tx_hash: &str) -> ProviderResult<Option<TransactionReceipt>>;

    /// 只读合约调用，空字节串表示“无数据”
    async fn call(&self, to: &str, data: &[u8]) -> ProviderResult<Vec<u8>>;

    async fn estimate_gas(&self, call: &CallRequest) -> ProviderResult<U256>;

    /// 桥交易状态，默认按回执映射（无回执 → NotFound）
    async fn transaction_status(&self, tx_hash: &str) -> ProviderResult<BridgeTransactionStatus> {
        let receipt = self.get_receipt(tx_hash).await?;
        Ok(BridgeTransactionStatus::from_receipt(receipt.as_ref()))
    }
}

/// 轮询回执直到出现或超出次数。超时返回 NotFound，调用方可稍后用交易哈希继续查询。
pub async fn await_receipt(
    client: &dyn LedgerClient,
    tx_hash: &str,
    poll: &ReceiptPollConfig,
) -> ProviderResult<TransactionReceipt> {
    let attempts = poll.max_attempts.max(1);

    for attempt in 1..=attempts {
        if let Some(receipt) = client.get_receipt(tx_hash).await? {
            tracing::debug!(tx_hash = %tx_hash, attempt, "Receipt available");
            return Ok(receipt);
        }
        if attempt < attempts {
            tokio::time::sleep(Duration::from_millis(poll.interval_ms)).await;
        }
    }

    tracing::warn!(tx_hash = %tx_hash, attempts, "Receipt not available after polling");
    Err(ProviderError {
        tx_hash: Some(tx_hash.to_string()),
        ..ProviderError::not_found(format!(
            "Receipt for {} not available after {} attempts",
            tx_hash, attempts
        ))
    })
}
