// EVM 本地签名（legacy 交易，EIP-155 链 ID 防重放）

use ethers::{
    signers::{LocalWallet, Signer},
    types::{transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest},
};
use k256::ecdsa::SigningKey;

use crate::{
    domain::{derivation, UnsignedTransaction},
    error::{ProviderError, ProviderResult},
    service::signer::TransactionSigner,
};

pub struct EvmSigner {
    wallet: LocalWallet,
}

impl EvmSigner {
    pub fn new(key: SigningKey, chain_id: u64) -> Self {
        Self {
            wallet: LocalWallet::from(key).with_chain_id(chain_id),
        }
    }

    /// 由 hex 私钥构造
    pub fn from_private_key(private_key: &str, chain_id: u64) -> ProviderResult<Self> {
        let key = derivation::parse_private_key(private_key)
            .map_err(|e| ProviderError::invalid_request(format!("{:#}", e)))?;
        Ok(Self::new(key, chain_id))
    }

    pub fn chain_id(&self) -> u64 {
        self.wallet.chain_id()
    }
}

pub(crate) fn parse_address(address: &str) -> ProviderResult<Address> {
    address
        .trim()
        .parse::<Address>()
        .map_err(|e| ProviderError::invalid_request(format!("Invalid EVM address {}: {}", address, e)))
}

impl TransactionSigner for EvmSigner {
    fn address(&self) -> String {
        format!("{:?}", self.wallet.address())
    }

    fn sign(&self, tx: &UnsignedTransaction) -> ProviderResult<Vec<u8>> {
        let to = parse_address(&tx.to)?;

        let request = TransactionRequest::new()
            .from(self.wallet.address())
            .to(to)
            .value(tx.value)
            .data(Bytes::from(tx.data.clone()))
            .nonce(tx.nonce)
            .gas(tx.gas_limit)
            .gas_price(tx.gas_price)
            .chain_id(tx.chain_id);
        let typed: TypedTransaction = request.into();

        let signature = self
            .wallet
            .sign_transaction_sync(&typed)
            .map_err(|e| ProviderError::invalid_request(format!("Failed to sign transaction: {}", e)))?;

        tracing::debug!(
            from = %self.address(),
            to = %tx.to,
            nonce = tx.nonce,
            chain_id = tx.chain_id,
            "EVM transaction signed"
        );

        Ok(typed.rlp_signed(&signature).to_vec())
    }
}
