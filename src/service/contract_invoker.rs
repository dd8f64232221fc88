// 合约调用：Keccak-256 选择器 + 标准 ABI 编码

use ethers::{
    abi::{self, Token},
    types::U256,
};

use crate::{
    domain::{ContractCallRequest, TransactionReceipt, UnsignedTransaction},
    error::{ProviderError, ProviderResult},
    service::{
        chain_session::ChainSession,
        ledger_client::{self, CallRequest},
        signer::TransactionSigner,
        transaction_submitter::TransactionSubmitter,
    },
};

pub struct ContractInvoker<'a> {
    session: &'a ChainSession,
}

/// selector || abi.encode(args)
pub fn encode_call(request: &ContractCallRequest) -> ProviderResult<Vec<u8>> {
    if !Token::types_check(&request.args, &request.function.inputs) {
        return Err(ProviderError::invalid_request(format!(
            "Arguments do not match {}",
            request.function.signature()
        )));
    }

    let mut data = request.function.selector().to_vec();
    data.extend(abi::encode(&request.args));
    Ok(data)
}

impl<'a> ContractInvoker<'a> {
    pub fn new(session: &'a ChainSession) -> Self {
        Self { session }
    }

    /// 只读调用，空结果原样返回
    pub async fn call(&self, request: &ContractCallRequest) -> ProviderResult<Vec<u8>> {
        let contract = self.session.resolve_contract(&request.contract_address)?;
        let data = encode_call(request)?;
        let raw = self.session.ledger.call(&contract, &data).await?;
        tracing::debug!(
            contract = %contract,
            function = %request.function.signature(),
            bytes = raw.len(),
            "Contract call returned"
        );
        Ok(raw)
    }

    /// 只读调用并按 outputs 解码；空结果解码为空列表
    pub async fn call_decoded(&self, request: &ContractCallRequest) -> ProviderResult<Vec<Token>> {
        let raw = self.call(request).await?;
        if raw.is_empty() {
            return Ok(Vec::new());
        }
        abi::decode(&request.function.outputs, &raw).map_err(|e| {
            ProviderError::deserialization(format!(
                "Failed to decode {} result: {}",
                request.function.signature(),
                e
            ))
        })
    }

    /// 构造、签名并广播；不等待回执
    pub async fn send(
        &self,
        request: &ContractCallRequest,
        signer: &dyn TransactionSigner,
    ) -> ProviderResult<String> {
        let contract = self.session.resolve_contract(&request.contract_address)?;
        let data = encode_call(request)?;
        let from = signer.address();
        let ledger = &self.session.ledger;

        let nonce = ledger.get_nonce(&from).await?;
        let estimated = ledger
            .estimate_gas(&CallRequest {
                from: Some(from.clone()),
                to: contract.clone(),
                data: data.clone(),
                value: request.value,
            })
            .await?;
        let gas_limit = estimated * U256::from(100 + self.session.gas_buffer_percent) / U256::from(100);

        let submitter = TransactionSubmitter::new(self.session);
        let tx = UnsignedTransaction {
            to: contract.clone(),
            value: request.value,
            data,
            nonce,
            gas_limit,
            gas_price: submitter.resolve_gas_price().await?,
            chain_id: self.session.params.chain_id,
            memo: String::new(),
        };

        let tx_hash = submitter.sign_and_broadcast(signer, &tx).await?;
        tracing::info!(
            contract = %contract,
            function = %request.function.signature(),
            tx_hash = %tx_hash,
            from = %from,
            nonce,
            gas_limit = %gas_limit,
            "Contract transaction broadcast"
        );
        Ok(tx_hash)
    }

    /// 状态变更调用：广播后等待回执，回执失败返回 TransactionFailed
    pub async fn invoke(
        &self,
        request: &ContractCallRequest,
        signer: &dyn TransactionSigner,
    ) -> ProviderResult<TransactionReceipt> {
        let tx_hash = self.send(request, signer).await?;
        let receipt =
            ledger_client::await_receipt(self.session.ledger.as_ref(), &tx_hash, &self.session.receipt_poll)
                .await?;

        if !receipt.is_success() {
            tracing::warn!(
                tx_hash = %tx_hash,
                function = %request.function.signature(),
                "Contract transaction reverted"
            );
            return Err(ProviderError::transaction_failed(
                tx_hash,
                format!("{} reverted", request.function.signature()),
            ));
        }
        Ok(receipt)
    }
}
