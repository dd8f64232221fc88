//! 测试辅助模块
//! 可记录调用顺序的假账本客户端、内存内容存储和固定配置

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use bridgecore::{
    config::{EvmConfig, ReceiptPollConfig, StacksConfig},
    domain::{ReceiptStatus, StacksNetwork, TransactionReceipt},
    error::{ProviderError, ProviderResult},
    service::{
        content_store::ContentStore,
        ledger_client::{CallRequest, LedgerClient},
    },
};
use ethers::types::U256;

/// Hardhat 默认账户 #0 / #1
pub const USER_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const USER_ADDRESS: &str = "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266";
pub const POOL_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
pub const POOL_ADDRESS: &str = "0x70997970c51812dc3a010c7d01b50e0d17dc79c8";
pub const NFT_CONTRACT: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

pub const STACKS_USER_KEY: &str = "edf9aee84d9b7abc145504dde6726c64f369d37ee34ded868fabd876c26570bc01";
pub const STACKS_POOL_KEY: &str = "c71700b07d520a8c9731e4d0f095aa6efb91e16e25fb27ce2b72e7b698f8127a01";

/// 1 个整币（18 位精度）
pub fn ether(n: u64) -> U256 {
    U256::from(n) * U256::exp10(18)
}

pub fn fast_poll() -> ReceiptPollConfig {
    ReceiptPollConfig {
        interval_ms: 1,
        max_attempts: 3,
    }
}

/// 不读环境变量的 EVM 配置
pub fn evm_config() -> EvmConfig {
    EvmConfig {
        rpc_url: "http://127.0.0.1:8545".into(),
        chain_id: 31337,
        private_key: Some(POOL_KEY.into()),
        contract_address: Some(NFT_CONTRACT.into()),
        bridge_pool_address: Some(POOL_ADDRESS.into()),
        decimals: 18,
        transfer_gas_limit: 21_000,
        gas_price_wei: Some(1_000_000_000),
        gas_estimate_buffer_percent: 20,
        nft_burn_enabled: false,
        receipt_poll: fast_poll(),
    }
}

pub fn stacks_config() -> StacksConfig {
    StacksConfig {
        api_url: "http://127.0.0.1:3999".into(),
        network: StacksNetwork::Testnet,
        private_key: Some(STACKS_POOL_KEY.into()),
        bridge_pool_address: None,
        decimals: 6,
        transfer_tx_bytes: 180,
        fee_rate: Some(1),
        gaia_hub_url: "http://127.0.0.1:3000".into(),
        gaia_auth_token: None,
        gaia_app_private_key: None,
        receipt_poll: fast_poll(),
    }
}

/// 假账本：记录每次调用，广播依次返回 tx1、tx2 ...
#[derive(Default)]
pub struct FakeLedger {
    calls: Mutex<Vec<String>>,
    balances: Mutex<HashMap<String, U256>>,
    /// 第一次余额读取之后改写余额
    balance_after_first_read: Mutex<Option<U256>>,
    balance_reads: AtomicUsize,
    nonces: Mutex<HashMap<String, u64>>,
    receipts: Mutex<HashMap<String, ReceiptStatus>>,
    /// 广播后立即给出回执
    auto_receipt: Mutex<Option<ReceiptStatus>>,
    /// 按函数选择器返回的只读调用结果
    call_results: Mutex<HashMap<[u8; 4], Vec<u8>>>,
    pings: AtomicUsize,
    broadcasts: AtomicU64,
    fail_ping: AtomicBool,
    raw_broadcasts: Mutex<Vec<Vec<u8>>>,
}

fn key(address: &str) -> String {
    address.trim().to_lowercase()
}

impl FakeLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_balance(&self, address: &str, balance: U256) {
        self.balances.lock().unwrap().insert(key(address), balance);
    }

    pub fn drain_balance_after_first_read(&self, balance: U256) {
        *self.balance_after_first_read.lock().unwrap() = Some(balance);
    }

    pub fn set_nonce(&self, address: &str, nonce: u64) {
        self.nonces.lock().unwrap().insert(key(address), nonce);
    }

    pub fn set_receipt(&self, tx_hash: &str, status: ReceiptStatus) {
        self.receipts.lock().unwrap().insert(tx_hash.to_string(), status);
    }

    pub fn auto_receipt(&self, status: ReceiptStatus) {
        *self.auto_receipt.lock().unwrap() = Some(status);
    }

    pub fn set_call_result(&self, selector: [u8; 4], data: Vec<u8>) {
        self.call_results.lock().unwrap().insert(selector, data);
    }

    pub fn fail_ping(&self) {
        self.fail_ping.store(true, Ordering::SeqCst);
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    pub fn broadcast_count(&self) -> u64 {
        self.broadcasts.load(Ordering::SeqCst)
    }

    pub fn raw_broadcasts(&self) -> Vec<Vec<u8>> {
        self.raw_broadcasts.lock().unwrap().clone()
    }

    /// 调用名（不含参数），按发生顺序
    pub fn call_names(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.split(':').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }
}

#[async_trait]
impl LedgerClient for FakeLedger {
    async fn ping(&self) -> ProviderResult<()> {
        self.record("ping");
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.fail_ping.load(Ordering::SeqCst) {
            return Err(ProviderError::network("connection refused"));
        }
        Ok(())
    }

    async fn get_balance(&self, address: &str) -> ProviderResult<U256> {
        self.record(format!("get_balance:{}", key(address)));
        let balance = self
            .balances
            .lock()
            .unwrap()
            .get(&key(address))
            .copied()
            .unwrap_or_default();

        if self.balance_reads.fetch_add(1, Ordering::SeqCst) == 0 {
            if let Some(next) = self.balance_after_first_read.lock().unwrap().take() {
                self.balances.lock().unwrap().insert(key(address), next);
            }
        }
        Ok(balance)
    }

    async fn get_nonce(&self, address: &str) -> ProviderResult<u64> {
        self.record(format!("get_nonce:{}", key(address)));
        Ok(self
            .nonces
            .lock()
            .unwrap()
            .get(&key(address))
            .copied()
            .unwrap_or_default())
    }

    async fn gas_price(&self) -> ProviderResult<U256> {
        self.record("gas_price");
        Ok(U256::from(1_000_000_000u64))
    }

    async fn broadcast(&self, signed_tx: &[u8]) -> ProviderResult<String> {
        self.record("broadcast");
        let n = self.broadcasts.fetch_add(1, Ordering::SeqCst) + 1;
        let tx_hash = format!("tx{}", n);
        self.raw_broadcasts.lock().unwrap().push(signed_tx.to_vec());
        if let Some(status) = *self.auto_receipt.lock().unwrap() {
            self.receipts.lock().unwrap().insert(tx_hash.clone(), status);
        }
        Ok(tx_hash)
    }

    async fn get_receipt(&self, tx_hash: &str) -> ProviderResult<Option<TransactionReceipt>> {
        self.record(format!("get_receipt:{}", tx_hash));
        Ok(self
            .receipts
            .lock()
            .unwrap()
            .get(tx_hash)
            .map(|status| TransactionReceipt::new(tx_hash, *status)))
    }

    async fn call(&self, to: &str, data: &[u8]) -> ProviderResult<Vec<u8>> {
        self.record(format!("call:{}", key(to)));
        let Some(selector) = data.get(..4).and_then(|s| <[u8; 4]>::try_from(s).ok()) else {
            return Ok(Vec::new());
        };
        Ok(self
            .call_results
            .lock()
            .unwrap()
            .get(&selector)
            .cloned()
            .unwrap_or_default())
    }

    async fn estimate_gas(&self, call: &CallRequest) -> ProviderResult<U256> {
        self.record(format!("estimate_gas:{}", key(&call.to)));
        Ok(U256::from(100_000u64))
    }
}

/// 内存内容存储，按路径有序
#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    /// 写入这些路径时失败
    reject: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reject_path(&self, path: &str) {
        self.reject.lock().unwrap().push(path.to_string());
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn get(&self, path: &str) -> ProviderResult<Option<Vec<u8>>> {
        Ok(self.files.lock().unwrap().get(path).cloned())
    }

    async fn put(&self, path: &str, content: Vec<u8>) -> ProviderResult<()> {
        if self.reject.lock().unwrap().iter().any(|p| p == path) {
            return Err(ProviderError::network_status(507, format!("Hub refused {}", path)));
        }
        self.files.lock().unwrap().insert(path.to_string(), content);
        Ok(())
    }

    async fn delete(&self, path: &str) -> ProviderResult<bool> {
        Ok(self.files.lock().unwrap().remove(path).is_some())
    }

    async fn list(&self, prefix: &str) -> ProviderResult<Vec<String>> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|p| p.starts_with(prefix))
            .cloned()
            .collect())
    }
}
