//! bridgecore - 多链 provider 核心
//!
//! EVM 与 Stacks 两条链的激活、转账、合约调用、代币/NFT 桥，
//! 以及基于 Gaia hub 的实体存储。所有对外操作都返回 [`ResultEnvelope`]。

pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod provider;
pub mod service;
pub mod utils;

pub use domain::ResultEnvelope;
pub use error::{ErrorKind, ProviderError, ProviderResult};

pub mod prelude {
    pub use crate::{
        config::{Config, EvmConfig, HttpClientConfig, StacksConfig},
        domain::{
            BridgeTransactionResponse, BridgeTransactionStatus, BurnNftRequest, ContractCallRequest,
            ContractFunction, MintNftRequest, NativeTransferRequest, NftTransferRequest,
            ProviderType, ResultEnvelope,
        },
        error::{ErrorKind, ProviderError, ProviderResult},
        provider::{
            AccountManager, EntityStorage, EvmProvider, NftBridge, Provider, SmartContracts,
            StacksProvider, TokenBridge, TokenOperations,
        },
    };
}
