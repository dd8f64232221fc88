//! 密钥派生策略
//!
//! 为 EVM 与 Stacks 提供统一的密钥生成、助记词创建与恢复接口。
//! 只生成/恢复密钥对，不保存任何私钥材料。

use anyhow::{Context, Result};
use bip39::{Language, Mnemonic};
use coins_bip32::path::DerivationPath;
use k256::ecdsa::SigningKey;
use rand::RngCore;
use serde::Serialize;
use zeroize::Zeroize;

use crate::{domain::chain::StacksNetwork, utils::c32};

/// 派生结果（调用方负责保管）
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeyPairAndWallet {
    /// 公钥 (hex)
    pub public_key: String,
    /// 私钥 (hex)
    pub private_key: String,
    pub address: String,
    pub chain_id: u64,
    /// 仅 create_account 返回
    pub seed_phrase: Option<String>,
}

/// 派生策略 trait
pub trait DerivationStrategy: Send + Sync {
    /// BIP44 路径，账户 0 / 找零 0 / 指定 index
    fn derivation_path(&self, index: u32) -> String;

    /// 由私钥生成公钥与地址
    fn key_pair(&self, key: &SigningKey) -> Result<KeyPairAndWallet>;

    /// 从种子派生
    fn derive_from_seed(&self, seed: &[u8], index: u32) -> Result<KeyPairAndWallet> {
        use coins_bip32::prelude::*;

        let path = self
            .derivation_path(index)
            .parse::<DerivationPath>()
            .context("Invalid derivation path")?;

        let master_key = XPriv::root_from_seed(seed, None).context("Failed to derive master key")?;
        let derived = master_key
            .derive_path(&path)
            .context("Failed to derive key")?;

        let signing_key: &SigningKey = derived.as_ref();
        self.key_pair(signing_key)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EVM 策略 (m/44'/60'/0'/0/i)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct EvmStrategy {
    pub chain_id: u64,
}

impl DerivationStrategy for EvmStrategy {
    fn derivation_path(&self, index: u32) -> String {
        format!("m/44'/60'/0'/0/{}", index)
    }

    fn key_pair(&self, key: &SigningKey) -> Result<KeyPairAndWallet> {
        Ok(KeyPairAndWallet {
            public_key: hex::encode(&evm_public_key(key)),
            private_key: format!("0x{}", hex::encode(key.to_bytes())),
            address: evm_address(key),
            chain_id: self.chain_id,
            seed_phrase: None,
        })
    }
}

/// 未压缩公钥去掉 0x04 前缀
fn evm_public_key(key: &SigningKey) -> Vec<u8> {
    let point = key.verifying_key().to_encoded_point(false);
    point.as_bytes()[1..].to_vec()
}

/// keccak256(pubkey) 后 20 字节
pub fn evm_address(key: &SigningKey) -> String {
    use sha3::{Digest, Keccak256};

    let hash = Keccak256::digest(evm_public_key(key));
    format!("0x{}", hex::encode(&hash[12..]))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stacks 策略 (m/44'/5757'/0'/0/i)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct StacksStrategy {
    pub network: StacksNetwork,
}

impl DerivationStrategy for StacksStrategy {
    fn derivation_path(&self, index: u32) -> String {
        format!("m/44'/5757'/0'/0/{}", index)
    }

    fn key_pair(&self, key: &SigningKey) -> Result<KeyPairAndWallet> {
        let public_key = compressed_public_key(key);
        Ok(KeyPairAndWallet {
            public_key: hex::encode(public_key),
            // 01 后缀表示压缩公钥
            private_key: format!("{}01", hex::encode(key.to_bytes())),
            address: stacks_address(key, self.network)?,
            chain_id: self.network.chain_id() as u64,
            seed_phrase: None,
        })
    }
}

pub fn compressed_public_key(key: &SigningKey) -> [u8; 33] {
    let point = key.verifying_key().to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(point.as_bytes());
    out
}

pub fn hash160(data: &[u8]) -> [u8; 20] {
    use bitcoin::hashes::{hash160, Hash};

    hash160::Hash::hash(data).to_byte_array()
}

pub fn stacks_address(key: &SigningKey, network: StacksNetwork) -> Result<String> {
    let hash = hash160(&compressed_public_key(key));
    c32::encode_address(network.address_version(), &hash)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// 账户操作
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// 解析 hex 私钥，兼容 0x 前缀与 Stacks 的 01 压缩后缀
pub fn parse_private_key(raw: &str) -> Result<SigningKey> {
    let trimmed = raw.trim().trim_start_matches("0x");
    let mut bytes = hex::decode(trimmed).context("Private key is not valid hex")?;
    if bytes.len() == 33 && bytes[32] == 0x01 {
        bytes.truncate(32);
    }
    if bytes.len() != 32 {
        bytes.zeroize();
        anyhow::bail!("Private key must be 32 bytes");
    }
    let key = SigningKey::from_slice(&bytes).context("Invalid secp256k1 private key");
    bytes.zeroize();
    key
}

/// 随机密钥对
pub fn generate_key_pair(strategy: &dyn DerivationStrategy) -> Result<KeyPairAndWallet> {
    let key = SigningKey::random(&mut rand::rngs::OsRng);
    strategy.key_pair(&key)
}

/// 新建 12 词助记词并派生 index 0 账户
pub fn create_account(strategy: &dyn DerivationStrategy) -> Result<KeyPairAndWallet> {
    let mut entropy = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut entropy);
    let mnemonic = Mnemonic::from_entropy_in(Language::English, &entropy)
        .context("Failed to generate mnemonic")?;
    entropy.zeroize();

    let phrase = mnemonic.to_string();
    let mut wallet = restore_account(strategy, &phrase)?;
    wallet.seed_phrase = Some(phrase);
    Ok(wallet)
}

/// 从助记词恢复 index 0 账户
pub fn restore_account(strategy: &dyn DerivationStrategy, seed_phrase: &str) -> Result<KeyPairAndWallet> {
    let mnemonic =
        Mnemonic::parse_in(Language::English, seed_phrase.trim()).context("Invalid mnemonic")?;
    let mut seed = mnemonic.to_seed("");
    let wallet = strategy.derive_from_seed(&seed, 0);
    seed.zeroize();
    wallet
}
