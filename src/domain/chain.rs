//! 链参数
//!
//! 每条链的最小单位精度、链 ID 与网络版本号都来自配置，不写死在业务代码里。

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::units::UnitScale;

/// 会话内使用的链参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainParams {
    /// 日志/错误中使用的链名称
    pub name: String,
    pub provider_type: ProviderType,
    pub chain_id: u64,
    /// 原生币最小单位精度（ETH 18 / STX 6）
    pub decimals: u32,
    /// 原生转账 gas limit（Stacks 为交易字节数）
    pub transfer_gas_limit: u64,
    /// 固定 gas price；None 时向节点查询
    pub gas_price: Option<u64>,
}

impl ChainParams {
    pub fn scale(&self) -> UnitScale {
        UnitScale::new(self.decimals)
    }
}

/// 桥合约 `sendNFT` 中记录的来源/目标 provider 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ProviderType {
    #[default]
    None,
    #[serde(rename = "EVM")]
    Evm,
    Stacks,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Evm => "EVM",
            Self::Stacks => "Stacks",
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StacksNetwork {
    Mainnet,
    Testnet,
}

impl StacksNetwork {
    /// c32 地址版本（单签 P2PKH）
    pub fn address_version(&self) -> u8 {
        match self {
            Self::Mainnet => 22,
            Self::Testnet => 26,
        }
    }

    /// 交易版本字节
    pub fn transaction_version(&self) -> u8 {
        match self {
            Self::Mainnet => 0x00,
            Self::Testnet => 0x80,
        }
    }

    pub fn chain_id(&self) -> u32 {
        match self {
            Self::Mainnet => 0x0000_0001,
            Self::Testnet => 0x8000_0000,
        }
    }

    pub fn default_api_url(&self) -> &'static str {
        match self {
            Self::Mainnet => "https://api.mainnet.hiro.so",
            Self::Testnet => "https://api.testnet.hiro.so",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
        }
    }
}

impl FromStr for StacksNetwork {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mainnet" | "main" => Ok(Self::Mainnet),
            "testnet" | "test" => Ok(Self::Testnet),
            other => Err(format!("Unknown Stacks network: {}", other)),
        }
    }
}

impl fmt::Display for StacksNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
