//! Provider 能力接口
//!
//! 每种能力一个 trait，具体 provider 按需组合；调用方只依赖自己需要的最窄能力。
//! 所有方法都返回 [`ResultEnvelope`]，不会把错误抛给调用方。

pub mod evm;
pub mod stacks;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    domain::{
        BridgeTransactionResponse, BridgeTransactionStatus, BurnNftRequest, ContractCallRequest,
        KeyPairAndWallet, MintNftRequest, NativeTransferRequest, NftTransferRequest,
        ResultEnvelope, SubmittedTransaction,
    },
    error::ProviderResult,
    service::batch_runner::BatchOutcome,
};

pub use evm::EvmProvider;
pub use stacks::StacksProvider;

/// 激活生命周期
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// 幂等；已激活时返回带提示的成功结果
    async fn activate(&self) -> ResultEnvelope<bool>;

    /// 从不失败
    async fn deactivate(&self) -> ResultEnvelope<bool>;

    fn is_activated(&self) -> bool;
}

/// 原生币转账与代币桥
#[async_trait]
pub trait TokenBridge: Provider {
    async fn send_transaction(
        &self,
        request: &NativeTransferRequest,
        sender_private_key: &str,
    ) -> ResultEnvelope<SubmittedTransaction>;

    async fn withdraw(
        &self,
        amount: Decimal,
        sender_address: &str,
        sender_private_key: &str,
    ) -> ResultEnvelope<BridgeTransactionResponse>;

    async fn deposit(
        &self,
        amount: Decimal,
        receiver_address: &str,
    ) -> ResultEnvelope<BridgeTransactionResponse>;

    async fn get_transaction_status(&self, tx_id: &str) -> ResultEnvelope<BridgeTransactionStatus>;
}

/// NFT 桥
#[async_trait]
pub trait NftBridge: Provider {
    async fn lock_nft(
        &self,
        request: &NftTransferRequest,
        owner_private_key: &str,
    ) -> ResultEnvelope<BridgeTransactionResponse>;

    async fn unlock_nft(&self, request: &NftTransferRequest) -> ResultEnvelope<BridgeTransactionResponse>;

    async fn mint_nft(&self, request: &MintNftRequest) -> ResultEnvelope<BridgeTransactionResponse>;

    async fn burn_nft(&self, request: &BurnNftRequest) -> ResultEnvelope<BridgeTransactionResponse>;

    async fn withdraw_nft(
        &self,
        request: &NftTransferRequest,
        owner_private_key: &str,
    ) -> ResultEnvelope<BridgeTransactionResponse>;

    async fn deposit_nft(&self, request: &MintNftRequest) -> ResultEnvelope<BridgeTransactionResponse>;
}

/// 同质化代币操作，返回交易哈希
#[async_trait]
pub trait TokenOperations: Provider {
    async fn send_token(
        &self,
        token_address: &str,
        sender_private_key: &str,
        to_address: &str,
        amount: Decimal,
    ) -> ResultEnvelope<String>;

    async fn mint_token(
        &self,
        token_address: &str,
        to_address: &str,
        amount: Decimal,
    ) -> ResultEnvelope<String>;

    async fn burn_token(
        &self,
        token_address: &str,
        owner_private_key: &str,
        amount: Decimal,
    ) -> ResultEnvelope<String>;

    async fn lock_token(
        &self,
        token_address: &str,
        owner_private_key: &str,
        amount: Decimal,
    ) -> ResultEnvelope<String>;

    async fn unlock_token(
        &self,
        token_address: &str,
        recipient_address: &str,
        amount: Decimal,
    ) -> ResultEnvelope<String>;

    async fn get_token_balance(&self, token_address: &str, owner_address: &str) -> ResultEnvelope<Decimal>;
}

/// 任意合约调用
#[async_trait]
pub trait SmartContracts: Provider {
    async fn call_contract(&self, request: &ContractCallRequest) -> ResultEnvelope<Vec<u8>>;

    /// 等待回执，返回交易哈希
    async fn invoke_contract(
        &self,
        request: &ContractCallRequest,
        signer_private_key: &str,
    ) -> ResultEnvelope<String>;
}

/// 账户：余额查询与密钥生成/恢复（不保存私钥）
#[async_trait]
pub trait AccountManager: Provider {
    async fn get_account_balance(&self, address: &str) -> ResultEnvelope<Decimal>;

    fn generate_key_pair(&self) -> ResultEnvelope<KeyPairAndWallet>;

    fn create_account(&self) -> ResultEnvelope<KeyPairAndWallet>;

    fn restore_account(&self, seed_phrase: &str) -> ResultEnvelope<KeyPairAndWallet>;
}

/// 以 JSON 文档形式存取实体
#[async_trait]
pub trait EntityStorage: Provider {
    async fn save_entity(&self, kind: &str, id: &str, entity: &Value) -> ResultEnvelope<String>;

    async fn load_entity(&self, kind: &str, id: &str) -> ResultEnvelope<Option<Value>>;

    async fn delete_entity(&self, kind: &str, id: &str) -> ResultEnvelope<bool>;

    async fn list_entities(&self, kind: &str) -> ResultEnvelope<Vec<String>>;

    async fn save_entities(
        &self,
        kind: &str,
        entities: Vec<(String, Value)>,
        continue_on_error: bool,
    ) -> ResultEnvelope<BatchOutcome<String>>;
}

/// 操作边界：记录失败并装入信封
pub(crate) fn finish<T: Default>(provider: &str, op: &str, result: ProviderResult<T>) -> ResultEnvelope<T> {
    if let Err(err) = &result {
        tracing::warn!(provider, op, kind = %err.kind, error = %err.message, "Provider operation failed");
    }
    ResultEnvelope::from_result(result)
}
