//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::{
    chain::{ChainParams, ProviderType},
    StacksNetwork,
};

/// 应用配置结构体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub http: HttpClientConfig,
    #[serde(default)]
    pub evm: EvmConfig,
    #[serde(default)]
    pub stacks: StacksConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
    pub enable_file_logging: bool,
    pub log_file_path: Option<String>,
}

/// HTTP 客户端超时（超时策略由客户端负责，核心不重试）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    pub request_timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

/// 回执轮询
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptPollConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

/// EVM provider 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvmConfig {
    pub rpc_url: String,
    pub chain_id: u64,
    /// 桥池账户私钥；缺省时只能执行只读操作
    pub private_key: Option<String>,
    /// 桥合约（sendNFT / mint）
    pub contract_address: Option<String>,
    /// 桥池地址；缺省为私钥对应地址
    pub bridge_pool_address: Option<String>,
    pub decimals: u32,
    pub transfer_gas_limit: u64,
    pub gas_price_wei: Option<u64>,
    /// estimateGas 结果上浮百分比
    pub gas_estimate_buffer_percent: u64,
    /// 是否部署了 ERC-721 burn
    pub nft_burn_enabled: bool,
    pub receipt_poll: ReceiptPollConfig,
}

/// Stacks / Gaia provider 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StacksConfig {
    pub api_url: String,
    pub network: StacksNetwork,
    pub private_key: Option<String>,
    pub bridge_pool_address: Option<String>,
    pub decimals: u32,
    /// STX 转账交易字节数，手续费 = fee_rate * 字节数
    pub transfer_tx_bytes: u64,
    /// 固定 fee rate（microSTX/byte）；None 时查询 /v2/fees/transfer
    pub fee_rate: Option<u64>,
    pub gaia_hub_url: String,
    /// 预签发的 Gaia 授权令牌（`v1:...`）
    pub gaia_auth_token: Option<String>,
    /// 用于签发 Gaia 授权令牌的应用私钥
    pub gaia_app_private_key: Option<String>,
    pub receipt_poll: ReceiptPollConfig,
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
            enable_file_logging: env_flag("LOG_FILE_ENABLED", false),
            log_file_path: std::env::var("LOG_FILE_PATH").ok(),
        }
    }
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: env_parse("HTTP_REQUEST_TIMEOUT_SECS").unwrap_or(30),
            connect_timeout_secs: env_parse("HTTP_CONNECT_TIMEOUT_SECS").unwrap_or(10),
        }
    }
}

impl Default for ReceiptPollConfig {
    fn default() -> Self {
        Self {
            interval_ms: env_parse("RECEIPT_POLL_INTERVAL_MS").unwrap_or(2_000),
            max_attempts: env_parse("RECEIPT_POLL_MAX_ATTEMPTS").unwrap_or(60),
        }
    }
}

impl Default for EvmConfig {
    fn default() -> Self {
        Self {
            rpc_url: std::env::var("EVM_RPC_URL")
                .unwrap_or_else(|_| "https://mainnet.base.org".into()),
            chain_id: env_parse("EVM_CHAIN_ID").unwrap_or(8453),
            private_key: env_non_empty("EVM_PRIVATE_KEY"),
            contract_address: env_non_empty("EVM_CONTRACT_ADDRESS"),
            bridge_pool_address: env_non_empty("EVM_BRIDGE_POOL_ADDRESS"),
            decimals: env_parse("EVM_DECIMALS").unwrap_or(18),
            transfer_gas_limit: env_parse("EVM_TRANSFER_GAS_LIMIT").unwrap_or(21_000),
            gas_price_wei: env_parse("EVM_GAS_PRICE_WEI"),
            gas_estimate_buffer_percent: env_parse("EVM_GAS_ESTIMATE_BUFFER_PERCENT")
                .unwrap_or(20),
            nft_burn_enabled: env_flag("EVM_NFT_BURN_ENABLED", true),
            receipt_poll: ReceiptPollConfig::default(),
        }
    }
}

impl Default for StacksConfig {
    fn default() -> Self {
        let network = std::env::var("STACKS_NETWORK")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(StacksNetwork::Mainnet);
        Self {
            api_url: std::env::var("STACKS_API_URL")
                .unwrap_or_else(|_| network.default_api_url().into()),
            network,
            private_key: env_non_empty("STACKS_PRIVATE_KEY"),
            bridge_pool_address: env_non_empty("STACKS_BRIDGE_POOL_ADDRESS"),
            decimals: env_parse("STACKS_DECIMALS").unwrap_or(6),
            transfer_tx_bytes: env_parse("STACKS_TRANSFER_TX_BYTES").unwrap_or(180),
            fee_rate: env_parse("STACKS_FEE_RATE"),
            gaia_hub_url: std::env::var("GAIA_HUB_URL")
                .unwrap_or_else(|_| "https://hub.blockstack.org".into()),
            gaia_auth_token: env_non_empty("GAIA_AUTH_TOKEN"),
            gaia_app_private_key: env_non_empty("GAIA_APP_PRIVATE_KEY"),
            receipt_poll: ReceiptPollConfig::default(),
        }
    }
}

impl EvmConfig {
    pub fn chain_params(&self) -> ChainParams {
        ChainParams {
            name: format!("evm-{}", self.chain_id),
            provider_type: ProviderType::Evm,
            chain_id: self.chain_id,
            decimals: self.decimals,
            transfer_gas_limit: self.transfer_gas_limit,
            gas_price: self.gas_price_wei,
        }
    }
}

impl StacksConfig {
    pub fn chain_params(&self) -> ChainParams {
        ChainParams {
            name: format!("stacks-{}", self.network),
            provider_type: ProviderType::Stacks,
            chain_id: self.network.chain_id() as u64,
            decimals: self.decimals,
            transfer_gas_limit: self.transfer_tx_bytes,
            gas_price: self.fee_rate,
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            logging: LoggingConfig::default(),
            http: HttpClientConfig::default(),
            evm: EvmConfig::default(),
            stacks: StacksConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                config = Self::from_file(path)?;
            }
        }

        Ok(config)
    }

    /// 读取 .env 后加载并校验
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_env_and_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("EVM_RPC_URL", &self.evm.rpc_url),
            ("STACKS_API_URL", &self.stacks.api_url),
            ("GAIA_HUB_URL", &self.stacks.gaia_hub_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
        }

        if self.evm.chain_id == 0 {
            anyhow::bail!("EVM_CHAIN_ID must be greater than 0");
        }

        if self.evm.decimals > 36 || self.stacks.decimals > 36 {
            anyhow::bail!("decimals must not exceed 36");
        }

        for address in [&self.evm.contract_address, &self.evm.bridge_pool_address]
            .into_iter()
            .flatten()
        {
            crate::infrastructure::rpc_validator::validate_address(address)
                .with_context(|| format!("Invalid EVM address in config: {}", address))?;
        }

        if let Some(pool) = &self.stacks.bridge_pool_address {
            crate::utils::c32::decode_address(pool)
                .with_context(|| format!("Invalid Stacks address in config: {}", pool))?;
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        Ok(())
    }
}
