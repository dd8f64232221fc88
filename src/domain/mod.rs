//! Domain 模块
//!
//! 请求/响应值对象、桥状态机、单位换算与密钥派生

pub mod bridge;
pub mod chain;
pub mod derivation;
pub mod envelope;
pub mod transaction;
pub mod units;

// 重新导出常用类型
pub use bridge::{
    BridgeTransactionResponse, BridgeTransactionStatus, BurnNftRequest, MintNftRequest,
    NftTransferRequest,
};
pub use chain::{ChainParams, ProviderType, StacksNetwork};
pub use derivation::{DerivationStrategy, EvmStrategy, KeyPairAndWallet, StacksStrategy};
pub use envelope::ResultEnvelope;
pub use transaction::{
    ContractCallRequest, ContractFunction, NativeTransferRequest, ReceiptStatus,
    SubmittedTransaction, TransactionReceipt, UnsignedTransaction,
};
pub use units::UnitScale;
