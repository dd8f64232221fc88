//! EVM provider
//!
//! 激活策略：FailFast。未激活时所有链上操作直接返回 NotActivated。

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{
    config::{EvmConfig, HttpClientConfig},
    domain::{
        derivation::{self, EvmStrategy},
        BridgeTransactionResponse, BridgeTransactionStatus, BurnNftRequest, ContractCallRequest,
        KeyPairAndWallet, MintNftRequest, NativeTransferRequest, NftTransferRequest,
        ResultEnvelope, SubmittedTransaction,
    },
    error::{ProviderError, ProviderResult},
    infrastructure::activation::{ActivationGate, ActivationPolicy},
    provider::{finish, AccountManager, NftBridge, Provider, SmartContracts, TokenBridge, TokenOperations},
    service::{
        bridge_coordinator::{bridge_failure, BridgeCoordinator},
        chain_session::ChainSession,
        contract_invoker::ContractInvoker,
        evm_rpc_client::EvmRpcClient,
        evm_signer::EvmSigner,
        ledger_client::LedgerClient,
        token_service::TokenService,
        transaction_submitter::TransactionSubmitter,
    },
};

pub struct EvmProvider {
    name: String,
    config: EvmConfig,
    http: HttpClientConfig,
    /// 测试或自定义传输时注入
    client_override: Option<Arc<dyn LedgerClient>>,
    gate: ActivationGate<ChainSession>,
}

impl EvmProvider {
    pub fn new(config: EvmConfig, http: HttpClientConfig) -> Self {
        let name = format!("EVM({})", config.chain_id);
        Self {
            gate: ActivationGate::new(name.clone(), ActivationPolicy::FailFast),
            name,
            config,
            http,
            client_override: None,
        }
    }

    /// 使用给定的账本客户端，不再创建 JSON-RPC 客户端
    pub fn with_client(config: EvmConfig, client: Arc<dyn LedgerClient>) -> Self {
        Self {
            client_override: Some(client),
            ..Self::new(config, HttpClientConfig::default())
        }
    }

    async fn connect(&self) -> ProviderResult<ChainSession> {
        let ledger: Arc<dyn LedgerClient> = match &self.client_override {
            Some(client) => client.clone(),
            None => Arc::new(EvmRpcClient::new(&self.config.rpc_url, &self.http)?),
        };
        ledger.ping().await?;

        let mut session = ChainSession::new(self.config.chain_params(), ledger)
            .with_receipt_poll(self.config.receipt_poll.clone())
            .with_gas_buffer_percent(self.config.gas_estimate_buffer_percent)
            .with_nft_burn(self.config.nft_burn_enabled);

        if let Some(pool) = &self.config.bridge_pool_address {
            session = session.with_bridge_pool(pool);
        }
        if let Some(key) = &self.config.private_key {
            session = session.with_pool_signer(Arc::new(self.signer(key)?));
        }
        if let Some(contract) = &self.config.contract_address {
            session = session.with_contract(contract);
        }

        tracing::debug!(
            provider = %self.name,
            endpoint = %self.config.rpc_url,
            bridge_pool = ?session.bridge_pool,
            contract = ?session.contract,
            "EVM session prepared"
        );
        Ok(session)
    }

    async fn session(&self) -> ProviderResult<Arc<ChainSession>> {
        self.gate.ensure(|| self.connect()).await
    }

    fn signer(&self, private_key: &str) -> ProviderResult<EvmSigner> {
        EvmSigner::from_private_key(private_key, self.config.chain_id)
    }

    fn strategy(&self) -> EvmStrategy {
        EvmStrategy {
            chain_id: self.config.chain_id,
        }
    }

    async fn session_and_signer(&self, private_key: &str) -> ProviderResult<(Arc<ChainSession>, EvmSigner)> {
        let session = self.session().await?;
        Ok((session, self.signer(private_key)?))
    }
}

#[async_trait]
impl Provider for EvmProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn activate(&self) -> ResultEnvelope<bool> {
        self.gate.activate(|| self.connect()).await
    }

    async fn deactivate(&self) -> ResultEnvelope<bool> {
        self.gate.deactivate().await
    }

    fn is_activated(&self) -> bool {
        self.gate.is_activated()
    }
}

#[async_trait]
impl TokenBridge for EvmProvider {
    async fn send_transaction(
        &self,
        request: &NativeTransferRequest,
        sender_private_key: &str,
    ) -> ResultEnvelope<SubmittedTransaction> {
        let result = async {
            let (session, signer) = self.session_and_signer(sender_private_key).await?;
            TransactionSubmitter::new(&session).submit(request, &signer).await
        }
        .await;
        finish(&self.name, "send_transaction", result)
    }

    async fn withdraw(
        &self,
        amount: Decimal,
        sender_address: &str,
        sender_private_key: &str,
    ) -> ResultEnvelope<BridgeTransactionResponse> {
        match self.session_and_signer(sender_private_key).await {
            Ok((session, signer)) => {
                BridgeCoordinator::new(&session)
                    .withdraw(amount, sender_address, &signer)
                    .await
            }
            Err(err) => bridge_failure(err),
        }
    }

    async fn deposit(&self, amount: Decimal, receiver_address: &str) -> ResultEnvelope<BridgeTransactionResponse> {
        match self.session().await {
            Ok(session) => BridgeCoordinator::new(&session).deposit(amount, receiver_address).await,
            Err(err) => bridge_failure(err),
        }
    }

    async fn get_transaction_status(&self, tx_id: &str) -> ResultEnvelope<BridgeTransactionStatus> {
        match self.session().await {
            Ok(session) => BridgeCoordinator::new(&session).get_transaction_status(tx_id).await,
            Err(err) => ResultEnvelope::failure_with(BridgeTransactionStatus::NotFound, err),
        }
    }
}

#[async_trait]
impl NftBridge for EvmProvider {
    async fn lock_nft(
        &self,
        request: &NftTransferRequest,
        owner_private_key: &str,
    ) -> ResultEnvelope<BridgeTransactionResponse> {
        match self.session_and_signer(owner_private_key).await {
            Ok((session, owner)) => BridgeCoordinator::new(&session).lock_nft(request, &owner).await,
            Err(err) => bridge_failure(err),
        }
    }

    async fn unlock_nft(&self, request: &NftTransferRequest) -> ResultEnvelope<BridgeTransactionResponse> {
        match self.session().await {
            Ok(session) => BridgeCoordinator::new(&session).unlock_nft(request).await,
            Err(err) => bridge_failure(err),
        }
    }

    async fn mint_nft(&self, request: &MintNftRequest) -> ResultEnvelope<BridgeTransactionResponse> {
        match self.session().await {
            Ok(session) => BridgeCoordinator::new(&session).mint_nft(request).await,
            Err(err) => bridge_failure(err),
        }
    }

    async fn burn_nft(&self, request: &BurnNftRequest) -> ResultEnvelope<BridgeTransactionResponse> {
        match self.session_and_signer(&request.owner_private_key).await {
            Ok((session, owner)) => BridgeCoordinator::new(&session).burn_nft(request, &owner).await,
            Err(err) => bridge_failure(err),
        }
    }

    async fn withdraw_nft(
        &self,
        request: &NftTransferRequest,
        owner_private_key: &str,
    ) -> ResultEnvelope<BridgeTransactionResponse> {
        match self.session_and_signer(owner_private_key).await {
            Ok((session, owner)) => BridgeCoordinator::new(&session).withdraw_nft(request, &owner).await,
            Err(err) => bridge_failure(err),
        }
    }

    async fn deposit_nft(&self, request: &MintNftRequest) -> ResultEnvelope<BridgeTransactionResponse> {
        match self.session().await {
            Ok(session) => BridgeCoordinator::new(&session).deposit_nft(request).await,
            Err(err) => bridge_failure(err),
        }
    }
}

#[async_trait]
impl TokenOperations for EvmProvider {
    async fn send_token(
        &self,
        token_address: &str,
        sender_private_key: &str,
        to_address: &str,
        amount: Decimal,
    ) -> ResultEnvelope<String> {
        let result: ProviderResult<String> = async {
            let (session, signer) = self.session_and_signer(sender_private_key).await?;
            let receipt = TokenService::new(&session)
                .send_token(token_address, &signer, to_address, amount)
                .await?;
            Ok(receipt.tx_hash)
        }
        .await;
        finish(&self.name, "send_token", result)
    }

    async fn mint_token(&self, token_address: &str, to_address: &str, amount: Decimal) -> ResultEnvelope<String> {
        let result: ProviderResult<String> = async {
            let session = self.session().await?;
            let minter = session.pool_signer()?;
            let receipt = TokenService::new(&session)
                .mint_token(token_address, minter, to_address, amount)
                .await?;
            Ok(receipt.tx_hash)
        }
        .await;
        finish(&self.name, "mint_token", result)
    }

    async fn burn_token(
        &self,
        token_address: &str,
        owner_private_key: &str,
        amount: Decimal,
    ) -> ResultEnvelope<String> {
        let result: ProviderResult<String> = async {
            let (session, signer) = self.session_and_signer(owner_private_key).await?;
            let receipt = TokenService::new(&session)
                .burn_token(token_address, &signer, amount)
                .await?;
            Ok(receipt.tx_hash)
        }
        .await;
        finish(&self.name, "burn_token", result)
    }

    async fn lock_token(
        &self,
        token_address: &str,
        owner_private_key: &str,
        amount: Decimal,
    ) -> ResultEnvelope<String> {
        let result: ProviderResult<String> = async {
            let (session, signer) = self.session_and_signer(owner_private_key).await?;
            let receipt = TokenService::new(&session)
                .lock_token(token_address, &signer, amount)
                .await?;
            Ok(receipt.tx_hash)
        }
        .await;
        finish(&self.name, "lock_token", result)
    }

    async fn unlock_token(
        &self,
        token_address: &str,
        recipient_address: &str,
        amount: Decimal,
    ) -> ResultEnvelope<String> {
        let result: ProviderResult<String> = async {
            let session = self.session().await?;
            let receipt = TokenService::new(&session)
                .unlock_token(token_address, recipient_address, amount)
                .await?;
            Ok(receipt.tx_hash)
        }
        .await;
        finish(&self.name, "unlock_token", result)
    }

    async fn get_token_balance(&self, token_address: &str, owner_address: &str) -> ResultEnvelope<Decimal> {
        let result = async {
            let session = self.session().await?;
            TokenService::new(&session)
                .balance_of(token_address, owner_address)
                .await
        }
        .await;
        finish(&self.name, "get_token_balance", result)
    }
}

#[async_trait]
impl SmartContracts for EvmProvider {
    async fn call_contract(&self, request: &ContractCallRequest) -> ResultEnvelope<Vec<u8>> {
        let result = async {
            let session = self.session().await?;
            ContractInvoker::new(&session).call(request).await
        }
        .await;
        finish(&self.name, "call_contract", result)
    }

    async fn invoke_contract(
        &self,
        request: &ContractCallRequest,
        signer_private_key: &str,
    ) -> ResultEnvelope<String> {
        let result: ProviderResult<String> = async {
            let (session, signer) = self.session_and_signer(signer_private_key).await?;
            let receipt = ContractInvoker::new(&session).invoke(request, &signer).await?;
            Ok(receipt.tx_hash)
        }
        .await;
        finish(&self.name, "invoke_contract", result)
    }
}

#[async_trait]
impl AccountManager for EvmProvider {
    async fn get_account_balance(&self, address: &str) -> ResultEnvelope<Decimal> {
        let result = async {
            let session = self.session().await?;
            let balance = session.ledger.get_balance(address).await?;
            session.params.scale().from_base(balance)
        }
        .await;
        finish(&self.name, "get_account_balance", result)
    }

    fn generate_key_pair(&self) -> ResultEnvelope<KeyPairAndWallet> {
        let result = derivation::generate_key_pair(&self.strategy())
            .map_err(|e| ProviderError::invalid_request(format!("{:#}", e)));
        finish(&self.name, "generate_key_pair", result)
    }

    fn create_account(&self) -> ResultEnvelope<KeyPairAndWallet> {
        let result = derivation::create_account(&self.strategy())
            .map_err(|e| ProviderError::invalid_request(format!("{:#}", e)));
        finish(&self.name, "create_account", result)
    }

    fn restore_account(&self, seed_phrase: &str) -> ResultEnvelope<KeyPairAndWallet> {
        let result = derivation::restore_account(&self.strategy(), seed_phrase)
            .map_err(|e| ProviderError::invalid_request(format!("{:#}", e)));
        finish(&self.name, "restore_account", result)
    }
}
