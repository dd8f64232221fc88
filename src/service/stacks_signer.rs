//! Stacks 单签 P2PKH 签名器
//!
//! 只构造 STX token-transfer 交易（SIP-005 线格式），固定 180 字节：
//!
//! ```text
//! version | chain_id | auth(0x04) | hash_mode | signer | nonce | fee | key_enc | sig(65)
//! anchor_mode | post_cond_mode | post_cond_len | payload(0x00) | principal | amount | memo(34)
//! ```
//!
//! 费用 = `gas_price`（每字节费率）× `gas_limit`（交易字节数）。

use ethers::types::U256;
use k256::ecdsa::SigningKey;
use sha2::{Digest, Sha512_256};

use crate::{
    domain::{derivation, StacksNetwork, UnsignedTransaction},
    error::{ProviderError, ProviderResult},
    service::signer::TransactionSigner,
    utils::c32,
};

const AUTH_STANDARD: u8 = 0x04;
const HASH_MODE_P2PKH: u8 = 0x00;
const KEY_ENCODING_COMPRESSED: u8 = 0x00;
const ANCHOR_MODE_ANY: u8 = 0x03;
const POST_CONDITION_MODE_DENY: u8 = 0x02;
const PAYLOAD_TOKEN_TRANSFER: u8 = 0x00;
const PRINCIPAL_STANDARD: u8 = 0x05;
const MEMO_LEN: usize = 34;
const SIGNATURE_LEN: usize = 65;

/// token-transfer 交易的序列化长度
pub const TOKEN_TRANSFER_TX_BYTES: usize = 180;

pub struct StacksSigner {
    key: SigningKey,
    network: StacksNetwork,
    signer_hash: [u8; 20],
}

/// 交易 ID = SHA512/256(序列化交易)
pub fn txid(raw: &[u8]) -> String {
    format!("0x{}", hex::encode(Sha512_256::digest(raw)))
}

fn to_u64(value: U256, field: &str) -> ProviderResult<u64> {
    if value > U256::from(u64::MAX) {
        return Err(ProviderError::invalid_request(format!(
            "{} exceeds u64 range: {}",
            field, value
        )));
    }
    Ok(value.as_u64())
}

/// 未签名的各字段，序列化时按需填入 nonce / fee / 签名
struct TokenTransfer<'a> {
    recipient_version: u8,
    recipient_hash: [u8; 20],
    amount: u64,
    memo: &'a str,
}

impl StacksSigner {
    pub fn new(key: SigningKey, network: StacksNetwork) -> Self {
        let signer_hash = derivation::hash160(&derivation::compressed_public_key(&key));
        Self {
            key,
            network,
            signer_hash,
        }
    }

    pub fn from_private_key(private_key: &str, network: StacksNetwork) -> ProviderResult<Self> {
        let key = derivation::parse_private_key(private_key)
            .map_err(|e| ProviderError::invalid_request(format!("{:#}", e)))?;
        Ok(Self::new(key, network))
    }

    fn serialize(
        &self,
        transfer: &TokenTransfer<'_>,
        nonce: u64,
        fee: u64,
        signature: &[u8; SIGNATURE_LEN],
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(TOKEN_TRANSFER_TX_BYTES);
        out.push(self.network.transaction_version());
        out.extend_from_slice(&self.network.chain_id().to_be_bytes());

        out.push(AUTH_STANDARD);
        out.push(HASH_MODE_P2PKH);
        out.extend_from_slice(&self.signer_hash);
        out.extend_from_slice(&nonce.to_be_bytes());
        out.extend_from_slice(&fee.to_be_bytes());
        out.push(KEY_ENCODING_COMPRESSED);
        out.extend_from_slice(signature);

        out.push(ANCHOR_MODE_ANY);
        out.push(POST_CONDITION_MODE_DENY);
        out.extend_from_slice(&0u32.to_be_bytes());

        out.push(PAYLOAD_TOKEN_TRANSFER);
        out.push(PRINCIPAL_STANDARD);
        out.push(transfer.recipient_version);
        out.extend_from_slice(&transfer.recipient_hash);
        out.extend_from_slice(&transfer.amount.to_be_bytes());

        let mut memo = [0u8; MEMO_LEN];
        memo[..transfer.memo.len()].copy_from_slice(transfer.memo.as_bytes());
        out.extend_from_slice(&memo);

        out
    }

    /// presign 哈希：SHA512/256(initial_sighash || auth_type || fee || nonce)
    fn presign_hash(initial: &[u8], fee: u64, nonce: u64) -> [u8; 32] {
        let mut hasher = Sha512_256::new();
        hasher.update(initial);
        hasher.update([AUTH_STANDARD]);
        hasher.update(fee.to_be_bytes());
        hasher.update(nonce.to_be_bytes());
        hasher.finalize().into()
    }
}

impl TransactionSigner for StacksSigner {
    fn address(&self) -> String {
        // 20 字节哈希与合法版本号不会失败
        c32::encode_address(self.network.address_version(), &self.signer_hash).unwrap_or_default()
    }

    fn sign(&self, tx: &UnsignedTransaction) -> ProviderResult<Vec<u8>> {
        if !tx.data.is_empty() {
            return Err(ProviderError::not_supported(
                "Stacks signer only builds STX token transfers",
            ));
        }
        if tx.memo.len() > MEMO_LEN {
            return Err(ProviderError::invalid_request(format!(
                "Memo exceeds {} bytes",
                MEMO_LEN
            )));
        }

        let (recipient_version, recipient_hash) = c32::decode_address(&tx.to).map_err(|e| {
            ProviderError::invalid_request(format!("Invalid Stacks address {}: {:#}", tx.to, e))
        })?;

        let transfer = TokenTransfer {
            recipient_version,
            recipient_hash,
            amount: to_u64(tx.value, "amount")?,
            memo: &tx.memo,
        };
        let fee = to_u64(tx.gas_price.saturating_mul(tx.gas_limit), "fee")?;

        // 初始 sighash：nonce/fee 置零、签名全零
        let cleared = self.serialize(&transfer, 0, 0, &[0u8; SIGNATURE_LEN]);
        let initial = Sha512_256::digest(&cleared);
        let presign = Self::presign_hash(&initial, fee, tx.nonce);

        let (signature, recovery_id) = self
            .key
            .sign_prehash_recoverable(&presign)
            .map_err(|e| ProviderError::invalid_request(format!("Failed to sign transaction: {}", e)))?;

        let mut encoded = [0u8; SIGNATURE_LEN];
        encoded[0] = recovery_id.to_byte();
        encoded[1..].copy_from_slice(&signature.to_bytes());

        let raw = self.serialize(&transfer, tx.nonce, fee, &encoded);
        tracing::debug!(
            from = %self.address(),
            to = %tx.to,
            nonce = tx.nonce,
            fee,
            txid = %txid(&raw),
            "Stacks token transfer signed"
        );
        Ok(raw)
    }
}
