//! 交易相关值对象（每次调用创建，返回后丢弃）

use ethers::{
    abi::{ParamType, Token},
    types::U256,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// 原生币转账请求，`amount` 必须大于 0
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTransferRequest {
    pub from_address: String,
    pub to_address: String,
    pub amount: Decimal,
    #[serde(default)]
    pub memo: String,
}

impl NativeTransferRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: Decimal) -> Self {
        Self {
            from_address: from.into(),
            to_address: to.into(),
            amount,
            memo: String::new(),
        }
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = memo.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    pub tx_hash: String,
    pub status: ReceiptStatus,
    pub block_number: Option<u64>,
    pub gas_used: Option<U256>,
}

impl TransactionReceipt {
    pub fn new(tx_hash: impl Into<String>, status: ReceiptStatus) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            status,
            block_number: None,
            gas_used: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReceiptStatus::Success
    }
}

/// 广播成功后的结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedTransaction {
    pub tx_hash: String,
    pub nonce: u64,
    /// 最小单位金额（wei / microSTX）
    pub amount_base: U256,
    /// 广播前观察到的余额
    pub observed_balance: U256,
}

/// 待签名交易。合约调用时 `data` 非空。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub to: String,
    pub value: U256,
    pub data: Vec<u8>,
    pub nonce: u64,
    pub gas_limit: U256,
    pub gas_price: U256,
    pub chain_id: u64,
    pub memo: String,
}

/// 合约函数描述，用于计算选择器与 ABI 编解码
#[derive(Debug, Clone, PartialEq)]
pub struct ContractFunction {
    pub name: String,
    pub inputs: Vec<ParamType>,
    pub outputs: Vec<ParamType>,
}

impl ContractFunction {
    pub fn new(name: impl Into<String>, inputs: Vec<ParamType>, outputs: Vec<ParamType>) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
        }
    }

    /// 规范签名，如 `transfer(address,uint256)`
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.inputs.iter().map(|p| p.to_string()).collect();
        format!("{}({})", self.name, params.join(","))
    }

    /// keccak256(signature) 前 4 字节
    pub fn selector(&self) -> [u8; 4] {
        ethers::abi::short_signature(&self.name, &self.inputs)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContractCallRequest {
    pub contract_address: String,
    pub function: ContractFunction,
    pub args: Vec<Token>,
    /// 随调用附带的原生币（wei）
    pub value: U256,
}

impl ContractCallRequest {
    pub fn new(contract_address: impl Into<String>, function: ContractFunction, args: Vec<Token>) -> Self {
        Self {
            contract_address: contract_address.into(),
            function,
            args,
            value: U256::zero(),
        }
    }
}
