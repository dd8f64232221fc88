//! 跨链桥状态与响应
//!
//! Pending 为唯一非终态；Completed / Canceled / NotFound 均为终态。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{
    chain::ProviderType,
    transaction::{ReceiptStatus, TransactionReceipt},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BridgeTransactionStatus {
    /// 已广播，等待上链
    #[default]
    Pending,
    /// 回执确认成功
    Completed,
    /// 回执失败或提交失败
    Canceled,
    /// 链上无此交易记录
    NotFound,
}

impl BridgeTransactionStatus {
    /// 是否为终态（不可再转换）
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Canceled => "canceled",
            Self::NotFound => "not_found",
        }
    }

    /// 由回执映射：无回执 → NotFound；成功 → Completed；失败 → Canceled
    pub fn from_receipt(receipt: Option<&TransactionReceipt>) -> Self {
        match receipt.map(|r| r.status) {
            None => Self::NotFound,
            Some(ReceiptStatus::Success) => Self::Completed,
            Some(ReceiptStatus::Failed) => Self::Canceled,
        }
    }
}

impl fmt::Display for BridgeTransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 跨链桥单腿交易结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeTransactionResponse {
    pub transaction_id: String,
    pub is_successful: bool,
    pub error_message: Option<String>,
    pub status: BridgeTransactionStatus,
}

impl BridgeTransactionResponse {
    pub fn pending(transaction_id: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            is_successful: true,
            error_message: None,
            status: BridgeTransactionStatus::Pending,
        }
    }

    pub fn completed(transaction_id: impl Into<String>) -> Self {
        Self {
            status: BridgeTransactionStatus::Completed,
            ..Self::pending(transaction_id)
        }
    }

    /// 失败腿：transaction_id 可能为空（未广播）
    pub fn canceled(transaction_id: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            is_successful: false,
            error_message: Some(error_message.into()),
            status: BridgeTransactionStatus::Canceled,
        }
    }

    pub fn from_receipt(receipt: &TransactionReceipt) -> Self {
        match receipt.status {
            ReceiptStatus::Success => Self::completed(receipt.tx_hash.clone()),
            ReceiptStatus::Failed => Self::canceled(
                receipt.tx_hash.clone(),
                "Transaction failed on chain",
            ),
        }
    }
}

/// NFT 桥请求（Lock / Unlock / Send）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftTransferRequest {
    /// NFT 合约地址
    pub token_address: String,
    /// 十进制 token id
    pub token_id: String,
    /// 原始持有人地址
    pub owner_address: String,
    /// 桥另一端的 provider（lock 的目标 / unlock 的来源）
    #[serde(default)]
    pub counterpart_provider: ProviderType,
    pub memo: String,
}

/// 铸造请求：在目标链上生成代表锁定资产的新 token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintNftRequest {
    pub metadata_url: String,
    pub recipient_address: String,
    pub memo: String,
}

/// 销毁请求
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnNftRequest {
    pub token_address: String,
    pub token_id: String,
    pub owner_private_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_pending_is_not_final() {
        use BridgeTransactionStatus::*;
        assert!(!Pending.is_final());
        for terminal in [Completed, Canceled, NotFound] {
            assert!(terminal.is_final());
        }
    }

    #[test]
    fn test_status_from_receipt() {
        let ok = TransactionReceipt::new("0x1", ReceiptStatus::Success);
        let failed = TransactionReceipt::new("0x2", ReceiptStatus::Failed);
        assert_eq!(
            BridgeTransactionStatus::from_receipt(Some(&ok)),
            BridgeTransactionStatus::Completed
        );
        assert_eq!(
            BridgeTransactionStatus::from_receipt(Some(&failed)),
            BridgeTransactionStatus::Canceled
        );
        assert_eq!(
            BridgeTransactionStatus::from_receipt(None),
            BridgeTransactionStatus::NotFound
        );
    }
}
