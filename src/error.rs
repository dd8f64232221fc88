//! 统一错误类型
//!
//! 所有 provider 操作在边界处把内部错误转换为 [`ProviderError`]，
//! 再由 [`crate::domain::envelope::ResultEnvelope`] 返回给调用方。

use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// provider 尚未激活
    NotActivated,
    /// 合约地址/句柄未配置
    ContractNotInitialized,
    InsufficientBalance,
    /// RPC/HTTP 非成功状态或连接失败
    NetworkError,
    DeserializationError,
    /// 交易已上链但回执显示失败
    TransactionFailed,
    NotFound,
    NotSupported,
    /// 参数校验失败
    InvalidRequest,
    /// 操作内部意外中止（例如 panic）
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotActivated => "not_activated",
            ErrorKind::ContractNotInitialized => "contract_not_initialized",
            ErrorKind::InsufficientBalance => "insufficient_balance",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::DeserializationError => "deserialization_error",
            ErrorKind::TransactionFailed => "transaction_failed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NotSupported => "not_supported",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP 状态码（仅 NetworkError）
    pub status: Option<u16>,
    /// 相关交易哈希，便于排查
    pub tx_hash: Option<String>,
}

pub type ProviderResult<T> = Result<T, ProviderError>;

impl ProviderError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
            status: None,
            tx_hash: None,
        }
    }

    pub fn not_activated(provider: &str) -> Self {
        Self::new(
            ErrorKind::NotActivated,
            format!("{} provider is not activated", provider),
        )
    }

    pub fn contract_not_initialized(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ContractNotInitialized, msg)
    }

    pub fn insufficient_balance(balance: impl fmt::Display, required: impl fmt::Display) -> Self {
        Self::new(
            ErrorKind::InsufficientBalance,
            format!(
                "Insufficient balance: available {}, required {}",
                balance, required
            ),
        )
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NetworkError, msg)
    }

    pub fn network_status(status: u16, msg: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            ..Self::new(ErrorKind::NetworkError, msg)
        }
    }

    pub fn deserialization(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::DeserializationError, msg)
    }

    pub fn transaction_failed(tx_hash: impl Into<String>, msg: impl Into<String>) -> Self {
        let tx_hash = tx_hash.into();
        Self {
            message: format!("{} (tx: {})", msg.into(), tx_hash),
            tx_hash: Some(tx_hash),
            ..Self::new(ErrorKind::TransactionFailed, "")
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn not_supported(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotSupported, msg)
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    /// 在消息前追加操作上下文
    pub fn context(mut self, ctx: impl fmt::Display) -> Self {
        self.message = format!("{}: {}", ctx, self.message);
        self
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::deserialization(err.to_string());
        }
        match err.status() {
            Some(status) => Self::network_status(status.as_u16(), err.to_string()),
            None => Self::network(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::deserialization(err.to_string())
    }
}
