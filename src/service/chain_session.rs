//! 激活后的链会话
//!
//! 由 provider 在激活时构造并放入 [`crate::infrastructure::activation::ActivationGate`]，
//! 各服务只能通过门拿到它，因此持有会话即意味着 provider 已激活。

use std::sync::Arc;

use crate::{
    config::ReceiptPollConfig,
    domain::ChainParams,
    error::{ProviderError, ProviderResult},
    service::{ledger_client::LedgerClient, signer::TransactionSigner},
};

pub struct ChainSession {
    pub params: ChainParams,
    pub ledger: Arc<dyn LedgerClient>,
    /// 桥池账户签名器；缺省时 deposit / unlock / mint 不可用
    pub pool_signer: Option<Arc<dyn TransactionSigner>>,
    pub bridge_pool: Option<String>,
    /// 默认合约（NFT / 桥合约）
    pub contract: Option<String>,
    pub receipt_poll: ReceiptPollConfig,
    /// 估算 gas 上浮百分比
    pub gas_buffer_percent: u64,
    pub nft_burn_enabled: bool,
}

impl ChainSession {
    pub fn new(params: ChainParams, ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            params,
            ledger,
            pool_signer: None,
            bridge_pool: None,
            contract: None,
            receipt_poll: ReceiptPollConfig::default(),
            gas_buffer_percent: 20,
            nft_burn_enabled: false,
        }
    }

    /// 配置池签名器；未单独配置池地址时使用签名器地址
    pub fn with_pool_signer(mut self, signer: Arc<dyn TransactionSigner>) -> Self {
        if self.bridge_pool.is_none() {
            self.bridge_pool = Some(signer.address());
        }
        self.pool_signer = Some(signer);
        self
    }

    pub fn with_bridge_pool(mut self, address: impl Into<String>) -> Self {
        self.bridge_pool = Some(address.into());
        self
    }

    pub fn with_contract(mut self, address: impl Into<String>) -> Self {
        self.contract = Some(address.into());
        self
    }

    pub fn with_receipt_poll(mut self, poll: ReceiptPollConfig) -> Self {
        self.receipt_poll = poll;
        self
    }

    pub fn with_gas_buffer_percent(mut self, percent: u64) -> Self {
        self.gas_buffer_percent = percent;
        self
    }

    pub fn with_nft_burn(mut self, enabled: bool) -> Self {
        self.nft_burn_enabled = enabled;
        self
    }

    pub fn bridge_pool(&self) -> ProviderResult<&str> {
        self.bridge_pool.as_deref().ok_or_else(|| {
            ProviderError::contract_not_initialized(format!(
                "Bridge pool address is not configured for {}",
                self.params.name
            ))
        })
    }

    pub fn pool_signer(&self) -> ProviderResult<&dyn TransactionSigner> {
        self.pool_signer.as_deref().ok_or_else(|| {
            ProviderError::contract_not_initialized(format!(
                "Bridge pool signing key is not configured for {}",
                self.params.name
            ))
        })
    }

    /// 显式地址优先，其次使用会话默认合约
    pub fn resolve_contract(&self, explicit: &str) -> ProviderResult<String> {
        let explicit = explicit.trim();
        if !explicit.is_empty() {
            return Ok(explicit.to_string());
        }
        self.contract.clone().ok_or_else(|| {
            ProviderError::contract_not_initialized(format!(
                "No contract address configured for {}",
                self.params.name
            ))
        })
    }
}
