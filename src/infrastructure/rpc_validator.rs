// 节点响应校验：十六进制字段在进入业务逻辑前统一解析

use anyhow::{Context, Result};
use ethers::types::U256;

/// 单笔交易 gas 上限，超过视为节点返回异常
const MAX_REASONABLE_GAS: u64 = 30_000_000;

fn strip_hex(value: &str) -> &str {
    value.trim().trim_matches('"').trim_start_matches("0x")
}

/// 定长十六进制（哈希 / 地址），统一为小写并带 0x
fn fixed_hex(value: &str, bytes: usize, what: &str) -> Result<String> {
    let digits = strip_hex(value);
    if digits.len() != bytes * 2 {
        anyhow::bail!(
            "Invalid {} length: expected {}, got {}",
            what,
            bytes * 2,
            digits.len()
        );
    }
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        anyhow::bail!("Invalid {} format: contains non-hex characters", what);
    }
    Ok(format!("0x{}", digits.to_lowercase()))
}

/// 解析 0x 前缀的 QUANTITY（最多 32 字节）
pub fn validate_quantity(quantity_hex: &str) -> Result<U256> {
    let digits = strip_hex(quantity_hex);
    if digits.is_empty() {
        anyhow::bail!("Empty hex quantity");
    }
    if digits.len() > 64 {
        anyhow::bail!("Quantity hex string too long: {}", digits.len());
    }
    U256::from_str_radix(digits, 16).context("Failed to parse quantity from hex")
}

pub fn validate_balance(balance_hex: &str) -> Result<U256> {
    validate_quantity(balance_hex).context("Invalid balance")
}

/// nonce / 区块号 / 回执状态等 u64 字段
pub fn validate_nonce(nonce_hex: &str) -> Result<u64> {
    let value = validate_quantity(nonce_hex).context("Invalid nonce")?;
    if value > U256::from(u64::MAX) {
        anyhow::bail!("Nonce out of range: {}", value);
    }
    Ok(value.as_u64())
}

pub fn validate_gas(gas_hex: &str) -> Result<U256> {
    let gas = validate_quantity(gas_hex).context("Invalid gas value")?;
    if gas > U256::from(MAX_REASONABLE_GAS) {
        anyhow::bail!("Gas exceeds reasonable maximum: {}", gas);
    }
    Ok(gas)
}

/// 32 字节交易哈希
pub fn validate_tx_hash(tx_hash: &str) -> Result<String> {
    fixed_hex(tx_hash, 32, "transaction hash")
}

/// 20 字节 EVM 地址，不区分大小写
pub fn validate_address(address: &str) -> Result<String> {
    fixed_hex(address, 20, "address")
}

/// 解析 DATA 字段；`0x` 视为空字节串
pub fn validate_data(data_hex: &str) -> Result<Vec<u8>> {
    hex::decode(strip_hex(data_hex)).context("Failed to decode hex data")
}

/// JSON-RPC 2.0 响应信封：存在 error 或缺少 result 都视为失败
pub fn validate_rpc_response(json: &serde_json::Value) -> Result<()> {
    if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(|c| c.as_i64()).unwrap_or(-1);
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("Unknown error");
        anyhow::bail!("RPC error {}: {}", code, message);
    }
    if let Some(version) = json.get("jsonrpc").filter(|v| v.as_str() != Some("2.0")) {
        anyhow::bail!("Unsupported JSON-RPC version: {:?}", version);
    }
    if json.get("result").is_none() {
        anyhow::bail!("Missing result field in RPC response");
    }
    Ok(())
}
