//! 原生币转账提交
//!
//! 余额与 nonce 必须按顺序各取一次，并在广播前完成余额校验；
//! 任一步失败立即返回，不做自动重试。

use ethers::types::U256;
use rust_decimal::Decimal;

use crate::{
    domain::{NativeTransferRequest, SubmittedTransaction, TransactionReceipt, UnsignedTransaction},
    error::{ProviderError, ProviderResult},
    service::{chain_session::ChainSession, ledger_client, signer::TransactionSigner},
};

pub struct TransactionSubmitter<'a> {
    session: &'a ChainSession,
}

fn same_address(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

impl<'a> TransactionSubmitter<'a> {
    pub fn new(session: &'a ChainSession) -> Self {
        Self { session }
    }

    /// 配置优先，否则向节点查询
    pub(crate) async fn resolve_gas_price(&self) -> ProviderResult<U256> {
        match self.session.params.gas_price {
            Some(price) => Ok(U256::from(price)),
            None => self.session.ledger.gas_price().await,
        }
    }

    /// 签名并广播
    pub(crate) async fn sign_and_broadcast(
        &self,
        signer: &dyn TransactionSigner,
        tx: &UnsignedTransaction,
    ) -> ProviderResult<String> {
        let raw = signer.sign(tx)?;
        self.session.ledger.broadcast(&raw).await
    }

    pub async fn submit(
        &self,
        request: &NativeTransferRequest,
        signer: &dyn TransactionSigner,
    ) -> ProviderResult<SubmittedTransaction> {
        let chain = &self.session.params.name;

        if request.amount <= Decimal::ZERO {
            return Err(ProviderError::invalid_request(format!(
                "Transfer amount must be greater than zero, got {}",
                request.amount
            )));
        }
        if !same_address(&request.from_address, &signer.address()) {
            return Err(ProviderError::invalid_request(format!(
                "Signer {} does not control sender {}",
                signer.address(),
                request.from_address
            )));
        }

        let ledger = &self.session.ledger;
        let balance = ledger.get_balance(&request.from_address).await?;
        let nonce = ledger.get_nonce(&request.from_address).await?;

        let amount_base = self.session.params.scale().to_base(request.amount)?;
        let gas_limit = U256::from(self.session.params.transfer_gas_limit);
        let gas_price = self.resolve_gas_price().await?;
        // 余额需覆盖转账金额与手续费（gas_price × gas_limit）
        let fee = gas_price
            .checked_mul(gas_limit)
            .ok_or_else(|| ProviderError::invalid_request("Transfer fee overflows"))?;
        let required = amount_base
            .checked_add(fee)
            .ok_or_else(|| ProviderError::invalid_request("Transfer amount overflows"))?;
        if balance < required {
            tracing::warn!(
                chain = %chain,
                from = %request.from_address,
                balance = %balance,
                required = %required,
                fee = %fee,
                "Insufficient balance for transfer"
            );
            return Err(ProviderError::insufficient_balance(balance, required));
        }

        let tx = UnsignedTransaction {
            to: request.to_address.clone(),
            value: amount_base,
            data: Vec::new(),
            nonce,
            gas_limit,
            gas_price,
            chain_id: self.session.params.chain_id,
            memo: request.memo.clone(),
        };

        let tx_hash = self.sign_and_broadcast(signer, &tx).await?;
        tracing::info!(
            chain = %chain,
            tx_hash = %tx_hash,
            from = %request.from_address,
            to = %request.to_address,
            amount = %request.amount,
            nonce,
            "Native transfer broadcast"
        );

        Ok(SubmittedTransaction {
            tx_hash,
            nonce,
            amount_base,
            observed_balance: balance,
        })
    }

    /// 提交并等待回执；回执失败返回 TransactionFailed
    pub async fn submit_and_confirm(
        &self,
        request: &NativeTransferRequest,
        signer: &dyn TransactionSigner,
    ) -> ProviderResult<(SubmittedTransaction, TransactionReceipt)> {
        let submitted = self.submit(request, signer).await?;
        let receipt = ledger_client::await_receipt(
            self.session.ledger.as_ref(),
            &submitted.tx_hash,
            &self.session.receipt_poll,
        )
        .await?;

        if !receipt.is_success() {
            return Err(ProviderError::transaction_failed(
                submitted.tx_hash,
                "Transfer failed on chain",
            ));
        }
        Ok((submitted, receipt))
    }
}
