//! 跨链桥协调器
//!
//! 代币桥：withdraw（发送方 → 桥池）/ deposit（桥池 → 接收方）。
//! NFT 桥：lock / unlock / mint / burn，以及组合操作 withdraw_nft / deposit_nft。
//!
//! 一次完整的跨链转移由两条独立链上的两笔交易组成，没有跨链原子提交：
//! 源链锁定成功而目标链铸造失败时不会自动回滚，资产留在桥池，
//! 由调用方按交易哈希查询各腿状态后自行对账。

use ethers::{
    abi::{ParamType, Token},
    types::U256,
};
use rust_decimal::Decimal;

use crate::{
    domain::{
        BridgeTransactionResponse, BridgeTransactionStatus, BurnNftRequest, ContractCallRequest,
        ContractFunction, MintNftRequest, NativeTransferRequest, NftTransferRequest,
        ResultEnvelope,
    },
    error::{ProviderError, ProviderResult},
    service::{
        chain_session::ChainSession, contract_invoker::ContractInvoker, evm_signer::parse_address,
        signer::TransactionSigner, transaction_submitter::TransactionSubmitter,
    },
};

/// 失败腿：Canceled 占位值，带上已知的交易哈希
pub fn bridge_failure(err: ProviderError) -> ResultEnvelope<BridgeTransactionResponse> {
    let tx_hash = err.tx_hash.clone().unwrap_or_default();
    ResultEnvelope::failure_with(
        BridgeTransactionResponse::canceled(tx_hash, err.message.clone()),
        err,
    )
}

/// `sendNFT(from, to, tokenId, fromProviderType, toProviderType, amount, memoText)`
pub fn send_nft_function() -> ContractFunction {
    ContractFunction::new(
        "sendNFT",
        vec![
            ParamType::Address,
            ParamType::Address,
            ParamType::Uint(256),
            ParamType::String,
            ParamType::String,
            ParamType::Uint(256),
            ParamType::String,
        ],
        vec![],
    )
}

/// `mint(to, metadataUri)`
pub fn mint_function() -> ContractFunction {
    ContractFunction::new("mint", vec![ParamType::Address, ParamType::String], vec![])
}

fn burn_function() -> ContractFunction {
    ContractFunction::new("burn", vec![ParamType::Uint(256)], vec![])
}

fn parse_token_id(token_id: &str) -> ProviderResult<U256> {
    U256::from_dec_str(token_id.trim())
        .map_err(|e| ProviderError::invalid_request(format!("Invalid token id {}: {}", token_id, e)))
}

pub struct BridgeCoordinator<'a> {
    session: &'a ChainSession,
}

impl<'a> BridgeCoordinator<'a> {
    pub fn new(session: &'a ChainSession) -> Self {
        Self { session }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // 代币桥
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 发送方 → 桥池，广播成功即返回 Pending
    pub async fn withdraw(
        &self,
        amount: Decimal,
        sender_address: &str,
        sender: &dyn TransactionSigner,
    ) -> ResultEnvelope<BridgeTransactionResponse> {
        let result = async {
            let pool = self.session.bridge_pool()?;
            let request = NativeTransferRequest::new(sender_address, pool, amount)
                .with_memo("bridge withdraw");
            TransactionSubmitter::new(self.session)
                .submit(&request, sender)
                .await
        }
        .await;

        match result {
            Ok(submitted) => {
                tracing::info!(
                    chain = %self.session.params.name,
                    tx_hash = %submitted.tx_hash,
                    sender = %sender_address,
                    amount = %amount,
                    "Bridge withdraw broadcast"
                );
                ResultEnvelope::ok(BridgeTransactionResponse::pending(submitted.tx_hash))
            }
            Err(err) => {
                tracing::warn!(
                    chain = %self.session.params.name,
                    sender = %sender_address,
                    error = %err,
                    "Bridge withdraw failed"
                );
                bridge_failure(err.context("Withdraw failed"))
            }
        }
    }

    /// 桥池 → 接收方，等待回执确认
    pub async fn deposit(
        &self,
        amount: Decimal,
        receiver_address: &str,
    ) -> ResultEnvelope<BridgeTransactionResponse> {
        let result = async {
            let pool_signer = self.session.pool_signer()?;
            let request = NativeTransferRequest::new(pool_signer.address(), receiver_address, amount)
                .with_memo("bridge deposit");
            TransactionSubmitter::new(self.session)
                .submit_and_confirm(&request, pool_signer)
                .await
        }
        .await;

        match result {
            Ok((_, receipt)) => {
                tracing::info!(
                    chain = %self.session.params.name,
                    tx_hash = %receipt.tx_hash,
                    receiver = %receiver_address,
                    amount = %amount,
                    "Bridge deposit completed"
                );
                ResultEnvelope::ok(BridgeTransactionResponse::from_receipt(&receipt))
            }
            Err(err) => {
                tracing::warn!(
                    chain = %self.session.params.name,
                    receiver = %receiver_address,
                    error = %err,
                    "Bridge deposit failed"
                );
                bridge_failure(err.context("Deposit failed"))
            }
        }
    }

    /// 按链的状态映射查询；EVM 为回执映射：缺失 → NotFound，成功 → Completed，失败 → Canceled
    pub async fn get_transaction_status(&self, tx_id: &str) -> ResultEnvelope<BridgeTransactionStatus> {
        match self.session.ledger.transaction_status(tx_id).await {
            Ok(status) => {
                tracing::debug!(
                    tx_hash = %tx_id,
                    status = %status,
                    is_final = status.is_final(),
                    "Bridge transaction status"
                );
                ResultEnvelope::ok(status)
            }
            Err(err) => ResultEnvelope::failure_with(
                BridgeTransactionStatus::NotFound,
                err.context(format!("Failed to query status of {}", tx_id)),
            ),
        }
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // NFT 桥
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// 单枚 NFT 转移；`outbound` 为 true 时从本链发往对端 provider
    async fn send_nft(
        &self,
        request: &NftTransferRequest,
        (from, to): (&str, &str),
        outbound: bool,
        signer: &dyn TransactionSigner,
    ) -> ProviderResult<String> {
        let local = self.session.params.provider_type;
        let (from_provider, to_provider) = if outbound {
            (local, request.counterpart_provider)
        } else {
            (request.counterpart_provider, local)
        };
        let call = ContractCallRequest::new(
            request.token_address.clone(),
            send_nft_function(),
            vec![
                Token::Address(parse_address(from)?),
                Token::Address(parse_address(to)?),
                Token::Uint(parse_token_id(&request.token_id)?),
                Token::String(from_provider.as_str().to_string()),
                Token::String(to_provider.as_str().to_string()),
                Token::Uint(U256::one()),
                Token::String(request.memo.clone()),
            ],
        );
        ContractInvoker::new(self.session).send(&call, signer).await
    }

    /// 持有人 → 桥池
    pub async fn lock_nft(
        &self,
        request: &NftTransferRequest,
        owner: &dyn TransactionSigner,
    ) -> ResultEnvelope<BridgeTransactionResponse> {
        let result = async {
            let pool = self.session.bridge_pool()?;
            self.send_nft(request, (&request.owner_address, pool), true, owner)
                .await
        }
        .await;

        match result {
            Ok(tx_hash) => {
                tracing::info!(
                    token = %request.token_address,
                    token_id = %request.token_id,
                    tx_hash = %tx_hash,
                    "NFT locked in bridge pool"
                );
                ResultEnvelope::ok(BridgeTransactionResponse::pending(tx_hash))
            }
            Err(err) => bridge_failure(err.context("Failed to lock NFT")),
        }
    }

    /// 桥池 → 原持有人
    pub async fn unlock_nft(&self, request: &NftTransferRequest) -> ResultEnvelope<BridgeTransactionResponse> {
        let result = async {
            let pool = self.session.bridge_pool()?;
            let pool_signer = self.session.pool_signer()?;
            self.send_nft(request, (pool, &request.owner_address), false, pool_signer)
                .await
        }
        .await;

        match result {
            Ok(tx_hash) => {
                tracing::info!(
                    token = %request.token_address,
                    token_id = %request.token_id,
                    tx_hash = %tx_hash,
                    "NFT released from bridge pool"
                );
                ResultEnvelope::ok(BridgeTransactionResponse::pending(tx_hash))
            }
            Err(err) => bridge_failure(err.context("Failed to unlock NFT")),
        }
    }

    /// 在本链铸造代表锁定资产的新 token；新 token id 与源 id 无关，由调用方记录对应关系
    pub async fn mint_nft(&self, request: &MintNftRequest) -> ResultEnvelope<BridgeTransactionResponse> {
        let result = async {
            let pool_signer = self.session.pool_signer()?;
            let call = ContractCallRequest::new(
                String::new(),
                mint_function(),
                vec![
                    Token::Address(parse_address(&request.recipient_address)?),
                    Token::String(request.metadata_url.clone()),
                ],
            );
            ContractInvoker::new(self.session).send(&call, pool_signer).await
        }
        .await;

        match result {
            Ok(tx_hash) => {
                tracing::info!(
                    recipient = %request.recipient_address,
                    tx_hash = %tx_hash,
                    "NFT mint broadcast"
                );
                ResultEnvelope::ok(BridgeTransactionResponse::pending(tx_hash))
            }
            Err(err) => bridge_failure(err.context("Failed to mint NFT")),
        }
    }

    /// ERC-721 `burn(uint256)`；未声明可销毁合约时返回 NotSupported
    pub async fn burn_nft(
        &self,
        request: &BurnNftRequest,
        owner: &dyn TransactionSigner,
    ) -> ResultEnvelope<BridgeTransactionResponse> {
        if !self.session.nft_burn_enabled {
            return bridge_failure(ProviderError::not_supported(format!(
                "NFT burn is not supported on {}",
                self.session.params.name
            )));
        }

        let result = async {
            let call = ContractCallRequest::new(
                request.token_address.clone(),
                burn_function(),
                vec![Token::Uint(parse_token_id(&request.token_id)?)],
            );
            ContractInvoker::new(self.session).invoke(&call, owner).await
        }
        .await;

        match result {
            Ok(receipt) => {
                tracing::info!(
                    token = %request.token_address,
                    token_id = %request.token_id,
                    tx_hash = %receipt.tx_hash,
                    "NFT burned"
                );
                ResultEnvelope::ok(BridgeTransactionResponse::completed(receipt.tx_hash))
            }
            Err(err) => bridge_failure(err.context("Failed to burn NFT")),
        }
    }

    /// 组合 lock：失败时原样透传子操作消息
    pub async fn withdraw_nft(
        &self,
        request: &NftTransferRequest,
        owner: &dyn TransactionSigner,
    ) -> ResultEnvelope<BridgeTransactionResponse> {
        Self::compose(self.lock_nft(request, owner).await, "Failed to withdraw NFT")
    }

    /// 组合 mint
    pub async fn deposit_nft(&self, request: &MintNftRequest) -> ResultEnvelope<BridgeTransactionResponse> {
        Self::compose(self.mint_nft(request).await, "Failed to deposit NFT")
    }

    fn compose(
        leg: ResultEnvelope<BridgeTransactionResponse>,
        context: &str,
    ) -> ResultEnvelope<BridgeTransactionResponse> {
        match leg.into_result() {
            Ok(response) => {
                ResultEnvelope::ok(BridgeTransactionResponse::pending(response.transaction_id))
            }
            Err(err) => {
                let message = err.message.clone();
                ResultEnvelope::failure_with(
                    BridgeTransactionResponse::canceled(String::new(), message),
                    err.context(context),
                )
            }
        }
    }
}
