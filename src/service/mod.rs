//! Service 层：账本客户端、签名器与各类链上操作编排

pub mod batch_runner;
pub mod bridge_coordinator;
pub mod chain_session;
pub mod content_store;
pub mod contract_invoker;
pub mod evm_rpc_client;
pub mod evm_signer;
pub mod gaia_hub_client;
pub mod ledger_client;
pub mod signer;
pub mod stacks_api_client;
pub mod stacks_signer;
pub mod token_service;
pub mod transaction_submitter;
