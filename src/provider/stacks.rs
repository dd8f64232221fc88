//! Stacks provider
//!
//! 激活策略：AutoActivate，首次使用时自动连接节点。
//! 原生 STX 转账与代币桥走节点 API；实体以 JSON 文档存放在 Gaia hub。
//! Stacks 上没有部署 NFT 桥合约，NFT 桥操作一律返回 NotSupported。

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::{
    config::{HttpClientConfig, StacksConfig},
    domain::{
        derivation::{self, StacksStrategy},
        BridgeTransactionResponse, BridgeTransactionStatus, BurnNftRequest, KeyPairAndWallet,
        MintNftRequest, NativeTransferRequest, NftTransferRequest, ResultEnvelope,
        SubmittedTransaction,
    },
    error::{ProviderError, ProviderResult},
    infrastructure::activation::{ActivationGate, ActivationPolicy},
    provider::{finish, AccountManager, EntityStorage, NftBridge, Provider, TokenBridge},
    service::{
        batch_runner::{self, BatchOutcome},
        bridge_coordinator::{bridge_failure, BridgeCoordinator},
        chain_session::ChainSession,
        content_store::ContentStore,
        gaia_hub_client::{GaiaAuth, GaiaHubClient},
        ledger_client::LedgerClient,
        stacks_api_client::StacksApiClient,
        stacks_signer::StacksSigner,
        transaction_submitter::TransactionSubmitter,
    },
};

const ENTITY_SUFFIX: &str = ".json";

pub struct StacksSession {
    pub chain: ChainSession,
    /// 未配置 Gaia 凭据时为 None
    pub store: Option<Arc<dyn ContentStore>>,
}

impl StacksSession {
    fn store(&self) -> ProviderResult<&dyn ContentStore> {
        self.store.as_deref().ok_or_else(|| {
            ProviderError::contract_not_initialized("Gaia hub credentials are not configured")
        })
    }
}

fn entity_path(kind: &str, id: &str) -> ProviderResult<String> {
    for (label, part) in [("kind", kind), ("id", id)] {
        if part.trim().is_empty() || part.contains('/') {
            return Err(ProviderError::invalid_request(format!(
                "Invalid entity {}: {:?}",
                label, part
            )));
        }
    }
    Ok(format!("{}/{}{}", kind, id, ENTITY_SUFFIX))
}

async fn put_entity(store: &dyn ContentStore, kind: &str, id: &str, entity: &Value) -> ProviderResult<String> {
    let path = entity_path(kind, id)?;
    let body = serde_json::to_vec(entity)?;
    store.put(&path, body).await?;
    tracing::debug!(path = %path, "Entity saved");
    Ok(path)
}

pub struct StacksProvider {
    name: String,
    config: StacksConfig,
    http: HttpClientConfig,
    client_override: Option<Arc<dyn LedgerClient>>,
    store_override: Option<Arc<dyn ContentStore>>,
    gate: ActivationGate<StacksSession>,
}

impl StacksProvider {
    pub fn new(config: StacksConfig, http: HttpClientConfig) -> Self {
        let name = format!("Stacks({})", config.network);
        Self {
            gate: ActivationGate::new(name.clone(), ActivationPolicy::AutoActivate),
            name,
            config,
            http,
            client_override: None,
            store_override: None,
        }
    }

    /// 使用给定的账本客户端与内容存储
    pub fn with_clients(
        config: StacksConfig,
        client: Arc<dyn LedgerClient>,
        store: Option<Arc<dyn ContentStore>>,
    ) -> Self {
        Self {
            client_override: Some(client),
            store_override: store,
            ..Self::new(config, HttpClientConfig::default())
        }
    }

    fn content_store(&self) -> ProviderResult<Option<Arc<dyn ContentStore>>> {
        if let Some(store) = &self.store_override {
            return Ok(Some(store.clone()));
        }

        let auth = if let Some(key) = &self.config.gaia_app_private_key {
            let key = derivation::parse_private_key(key)
                .map_err(|e| ProviderError::invalid_request(format!("{:#}", e)))?;
            GaiaAuth::AppKey(key)
        } else if let Some(token) = &self.config.gaia_auth_token {
            GaiaAuth::Token(token.clone())
        } else {
            return Ok(None);
        };

        let client = GaiaHubClient::new(&self.config.gaia_hub_url, auth, &self.http)?;
        Ok(Some(Arc::new(client)))
    }

    async fn connect(&self) -> ProviderResult<StacksSession> {
        let ledger: Arc<dyn LedgerClient> = match &self.client_override {
            Some(client) => client.clone(),
            None => Arc::new(StacksApiClient::new(&self.config.api_url, &self.http)?),
        };
        ledger.ping().await?;

        let mut chain = ChainSession::new(self.config.chain_params(), ledger)
            .with_receipt_poll(self.config.receipt_poll.clone());
        if let Some(pool) = &self.config.bridge_pool_address {
            chain = chain.with_bridge_pool(pool);
        }
        if let Some(key) = &self.config.private_key {
            chain = chain.with_pool_signer(Arc::new(self.signer(key)?));
        }

        let store = self.content_store()?;
        tracing::debug!(
            provider = %self.name,
            endpoint = %self.config.api_url,
            bridge_pool = ?chain.bridge_pool,
            gaia = store.is_some(),
            "Stacks session prepared"
        );
        Ok(StacksSession { chain, store })
    }

    async fn session(&self) -> ProviderResult<Arc<StacksSession>> {
        self.gate.ensure(|| self.connect()).await
    }

    fn signer(&self, private_key: &str) -> ProviderResult<StacksSigner> {
        StacksSigner::from_private_key(private_key, self.config.network)
    }

    fn strategy(&self) -> StacksStrategy {
        StacksStrategy {
            network: self.config.network,
        }
    }

    fn nft_not_supported(&self) -> ResultEnvelope<BridgeTransactionResponse> {
        bridge_failure(ProviderError::not_supported(format!(
            "NFT bridge is not supported on {}",
            self.name
        )))
    }
}

#[async_trait]
impl Provider for StacksProvider {
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
impl TokenBridge for StacksProvider {
    async fn send_transaction(
        &self,
        request: &NativeTransferRequest,
        sender_private_key: &str,
    ) -> ResultEnvelope<SubmittedTransaction> {
        let result = async {
            let session = self.session().await?;
            let signer = self.signer(sender_private_key)?;
            TransactionSubmitter::new(&session.chain)
                .submit(request, &signer)
                .await
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
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return bridge_failure(err),
        };
        match self.signer(sender_private_key) {
            Ok(signer) => {
                BridgeCoordinator::new(&session.chain)
                    .withdraw(amount, sender_address, &signer)
                    .await
            }
            Err(err) => bridge_failure(err),
        }
    }

    async fn deposit(&self, amount: Decimal, receiver_address: &str) -> ResultEnvelope<BridgeTransactionResponse> {
        match self.session().await {
            Ok(session) => {
                BridgeCoordinator::new(&session.chain)
                    .deposit(amount, receiver_address)
                    .await
            }
            Err(err) => bridge_failure(err),
        }
    }

    async fn get_transaction_status(&self, tx_id: &str) -> ResultEnvelope<BridgeTransactionStatus> {
        match self.session().await {
            Ok(session) => {
                BridgeCoordinator::new(&session.chain)
                    .get_transaction_status(tx_id)
                    .await
            }
            Err(err) => ResultEnvelope::failure_with(BridgeTransactionStatus::NotFound, err),
        }
    }
}

#[async_trait]
impl NftBridge for StacksProvider {
    async fn lock_nft(&self, _: &NftTransferRequest, _: &str) -> ResultEnvelope<BridgeTransactionResponse> {
        self.nft_not_supported()
    }

    async fn unlock_nft(&self, _: &NftTransferRequest) -> ResultEnvelope<BridgeTransactionResponse> {
        self.nft_not_supported()
    }

    async fn mint_nft(&self, _: &MintNftRequest) -> ResultEnvelope<BridgeTransactionResponse> {
        self.nft_not_supported()
    }

    async fn burn_nft(&self, _: &BurnNftRequest) -> ResultEnvelope<BridgeTransactionResponse> {
        self.nft_not_supported()
    }

    async fn withdraw_nft(&self, _: &NftTransferRequest, _: &str) -> ResultEnvelope<BridgeTransactionResponse> {
        self.nft_not_supported()
    }

    async fn deposit_nft(&self, _: &MintNftRequest) -> ResultEnvelope<BridgeTransactionResponse> {
        self.nft_not_supported()
    }
}

#[async_trait]
impl AccountManager for StacksProvider {
    async fn get_account_balance(&self, address: &str) -> ResultEnvelope<Decimal> {
        let result = async {
            let session = self.session().await?;
            let balance = session.chain.ledger.get_balance(address).await?;
            session.chain.params.scale().from_base(balance)
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

#[async_trait]
impl EntityStorage for StacksProvider {
    /// 返回存储路径 `{kind}/{id}.json`
    async fn save_entity(&self, kind: &str, id: &str, entity: &Value) -> ResultEnvelope<String> {
        let result = async {
            let session = self.session().await?;
            put_entity(session.store()?, kind, id, entity).await
        }
        .await;
        finish(&self.name, "save_entity", result)
    }

    async fn load_entity(&self, kind: &str, id: &str) -> ResultEnvelope<Option<Value>> {
        let result: ProviderResult<Option<Value>> = async {
            let session = self.session().await?;
            let path = entity_path(kind, id)?;
            match session.store()?.get(&path).await? {
                Some(body) => Ok(Some(serde_json::from_slice(&body)?)),
                None => Ok(None),
            }
        }
        .await;
        finish(&self.name, "load_entity", result)
    }

    async fn delete_entity(&self, kind: &str, id: &str) -> ResultEnvelope<bool> {
        let result = async {
            let session = self.session().await?;
            let path = entity_path(kind, id)?;
            session.store()?.delete(&path).await
        }
        .await;
        finish(&self.name, "delete_entity", result)
    }

    /// 返回该类别下的实体 id
    async fn list_entities(&self, kind: &str) -> ResultEnvelope<Vec<String>> {
        let result: ProviderResult<Vec<String>> = async {
            let session = self.session().await?;
            let prefix = format!("{}/", kind);
            let paths = session.store()?.list(&prefix).await?;
            Ok(paths
                .iter()
                .filter_map(|path| path.strip_prefix(&prefix)?.strip_suffix(ENTITY_SUFFIX))
                .filter(|id| !id.contains('/'))
                .map(str::to_string)
                .collect())
        }
        .await;
        finish(&self.name, "list_entities", result)
    }

    async fn save_entities(
        &self,
        kind: &str,
        entities: Vec<(String, Value)>,
        continue_on_error: bool,
    ) -> ResultEnvelope<BatchOutcome<String>> {
        let session = match self.session().await {
            Ok(session) => session,
            Err(err) => return finish(&self.name, "save_entities", Err(err)),
        };
        let store = match session.store() {
            Ok(store) => store,
            Err(err) => return finish(&self.name, "save_entities", Err(err)),
        };

        let outcome = batch_runner::run_all(
            entities,
            |(id, _)| id.clone(),
            |(id, entity)| async move { put_entity(store, kind, &id, &entity).await },
            continue_on_error,
        )
        .await;

        if outcome.is_error {
            tracing::warn!(
                provider = %self.name,
                kind = %kind,
                failed = outcome.value.failed.len(),
                message = %outcome.message,
                "Entity batch save incomplete"
            );
        }
        outcome
    }
}
