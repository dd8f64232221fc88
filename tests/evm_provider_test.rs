//! EVM provider 集成测试
//!
//! 使用记录调用顺序的假账本，覆盖激活、转账提交、代币桥与 NFT 桥的行为。

mod common;

use std::sync::Arc;

use bridgecore::{
    domain::{BurnNftRequest, MintNftRequest, NftTransferRequest, ProviderType, ReceiptStatus},
    prelude::*,
};
use common::*;
use ethers::{
    abi::{self, ParamType, Token},
    types::{transaction::eip2718::TypedTransaction, Address, U256},
    utils::rlp::Rlp,
};
use rust_decimal::Decimal;

fn provider(ledger: &Arc<FakeLedger>) -> EvmProvider {
    EvmProvider::with_client(evm_config(), ledger.clone())
}

async fn active_provider(ledger: &Arc<FakeLedger>) -> EvmProvider {
    let provider = provider(ledger);
    assert!(!provider.activate().await.is_error);
    ledger.clear_calls();
    provider
}

fn nft_request(token_id: &str) -> NftTransferRequest {
    NftTransferRequest {
        token_address: NFT_CONTRACT.into(),
        token_id: token_id.into(),
        owner_address: USER_ADDRESS.into(),
        counterpart_provider: ProviderType::Stacks,
        memo: "bridge".into(),
    }
}

struct Broadcast {
    tx: TypedTransaction,
    from: String,
}

impl Broadcast {
    fn to(&self) -> Option<String> {
        self.tx.to_addr().map(|a| format!("{:?}", a))
    }
}

fn decode_broadcast(raw: &[u8]) -> Broadcast {
    let (tx, signature) = TypedTransaction::decode_signed(&Rlp::new(raw)).expect("signed transaction");
    let from = signature.recover(tx.sighash()).expect("recoverable signature");
    Broadcast {
        tx,
        from: format!("{:?}", from),
    }
}

// ============ 激活 ============

#[tokio::test]
async fn test_activate_twice_is_idempotent() {
    let ledger = FakeLedger::new();
    let provider = provider(&ledger);

    let first = provider.activate().await;
    let second = provider.activate().await;

    assert!(!first.is_error && first.value);
    assert!(!second.is_error && second.value);
    assert!(second.is_warning);
    assert_eq!(ledger.ping_count(), 1);
    assert!(provider.is_activated());
}

#[tokio::test]
async fn test_activation_failure_leaves_provider_inactive() {
    let ledger = FakeLedger::new();
    ledger.fail_ping();
    let provider = provider(&ledger);

    let result = provider.activate().await;

    assert!(result.is_error);
    assert!(!result.value);
    assert_eq!(result.kind(), Some(ErrorKind::NetworkError));
    assert!(!provider.is_activated());
}

#[tokio::test]
async fn test_operations_fail_fast_when_not_activated() {
    let ledger = FakeLedger::new();
    ledger.set_balance(USER_ADDRESS, ether(100));
    let provider = provider(&ledger);

    let result = provider
        .withdraw(Decimal::from(1), USER_ADDRESS, USER_KEY)
        .await;

    assert!(result.is_error);
    assert_eq!(result.kind(), Some(ErrorKind::NotActivated));
    assert_eq!(result.value.status, BridgeTransactionStatus::Canceled);
    assert!(ledger.calls().is_empty());
}

#[tokio::test]
async fn test_deactivate_never_fails_and_blocks_later_calls() {
    let ledger = FakeLedger::new();
    let provider = active_provider(&ledger).await;

    assert!(!provider.deactivate().await.is_error);
    assert!(!provider.deactivate().await.is_error);
    assert!(!provider.is_activated());

    let balance = provider.get_account_balance(USER_ADDRESS).await;
    assert_eq!(balance.kind(), Some(ErrorKind::NotActivated));
}

// ============ 转账提交 ============

#[tokio::test]
async fn test_insufficient_balance_never_broadcasts() {
    let ledger = FakeLedger::new();
    ledger.set_balance(USER_ADDRESS, ether(5));
    let provider = active_provider(&ledger).await;

    let request = NativeTransferRequest::new(USER_ADDRESS, POOL_ADDRESS, Decimal::from(10));
    let result = provider.send_transaction(&request, USER_KEY).await;

    assert!(result.is_error);
    assert_eq!(result.kind(), Some(ErrorKind::InsufficientBalance));
    assert_eq!(ledger.broadcast_count(), 0);
    assert!(!ledger.call_names().contains(&"broadcast".to_string()));
}

#[tokio::test]
async fn test_balance_must_cover_amount_plus_fee() {
    // 1 gwei × 21000
    let fee = U256::from(21_000u64) * U256::exp10(9);
    let request = NativeTransferRequest::new(USER_ADDRESS, POOL_ADDRESS, Decimal::from(10));

    let ledger = FakeLedger::new();
    ledger.set_balance(USER_ADDRESS, ether(10));
    let provider = active_provider(&ledger).await;
    let short = provider.send_transaction(&request, USER_KEY).await;
    assert_eq!(short.kind(), Some(ErrorKind::InsufficientBalance));
    assert!(short.message.contains(&(ether(10) + fee).to_string()));
    assert_eq!(ledger.broadcast_count(), 0);

    let ledger = FakeLedger::new();
    ledger.set_balance(USER_ADDRESS, ether(10) + fee);
    let provider = active_provider(&ledger).await;
    let exact = provider.send_transaction(&request, USER_KEY).await;
    assert!(!exact.is_error, "{}", exact.message);
    assert_eq!(ledger.broadcast_count(), 1);
}

#[tokio::test]
async fn test_balance_is_read_once_before_nonce_and_broadcast() {
    let ledger = FakeLedger::new();
    ledger.set_balance(USER_ADDRESS, ether(100));
    ledger.drain_balance_after_first_read(U256::zero());
    ledger.set_nonce(USER_ADDRESS, 7);
    let provider = active_provider(&ledger).await;

    let request = NativeTransferRequest::new(USER_ADDRESS, POOL_ADDRESS, Decimal::from(10));
    let result = provider.send_transaction(&request, USER_KEY).await;

    assert!(!result.is_error, "{}", result.message);
    assert_eq!(result.value.observed_balance, ether(100));
    assert_eq!(result.value.nonce, 7);
    assert_eq!(
        ledger.call_names(),
        vec!["get_balance", "get_nonce", "broadcast"]
    );

    let sent = decode_broadcast(&ledger.raw_broadcasts()[0]);
    assert_eq!(sent.tx.nonce(), Some(&U256::from(7)));
    assert_eq!(sent.tx.value(), Some(&ether(10)));
    assert_eq!(sent.from, USER_ADDRESS);
}

#[tokio::test]
async fn test_signer_must_control_sender() {
    let ledger = FakeLedger::new();
    ledger.set_balance(POOL_ADDRESS, ether(100));
    let provider = active_provider(&ledger).await;

    let request = NativeTransferRequest::new(POOL_ADDRESS, USER_ADDRESS, Decimal::from(1));
    let result = provider.send_transaction(&request, USER_KEY).await;

    assert_eq!(result.kind(), Some(ErrorKind::InvalidRequest));
    assert!(ledger.calls().is_empty());
}

// ============ 代币桥 ============

#[tokio::test]
async fn test_withdraw_then_status_round_trip() {
    let ledger = FakeLedger::new();
    ledger.set_balance(USER_ADDRESS, ether(100));
    let provider = active_provider(&ledger).await;

    let withdraw = provider
        .withdraw(Decimal::from(50), USER_ADDRESS, USER_KEY)
        .await;
    assert!(!withdraw.is_error, "{}", withdraw.message);
    assert_eq!(withdraw.value.status, BridgeTransactionStatus::Pending);
    assert_eq!(withdraw.value.transaction_id, "tx1");

    let sent = decode_broadcast(&ledger.raw_broadcasts()[0]);
    assert_eq!(sent.to().as_deref(), Some(POOL_ADDRESS));

    // 尚无回执
    let status = provider.get_transaction_status("tx1").await;
    assert!(!status.is_error);
    assert_eq!(status.value, BridgeTransactionStatus::NotFound);

    ledger.set_receipt("tx1", ReceiptStatus::Success);
    let status = provider.get_transaction_status("tx1").await;
    assert_eq!(status.value, BridgeTransactionStatus::Completed);
}

#[tokio::test]
async fn test_deposit_waits_for_receipt() {
    let ledger = FakeLedger::new();
    ledger.set_balance(POOL_ADDRESS, ether(100));
    ledger.auto_receipt(ReceiptStatus::Success);
    let provider = active_provider(&ledger).await;

    let deposit = provider.deposit(Decimal::from(3), USER_ADDRESS).await;

    assert!(!deposit.is_error, "{}", deposit.message);
    assert_eq!(deposit.value.status, BridgeTransactionStatus::Completed);
    assert_eq!(deposit.value.transaction_id, "tx1");
    assert_eq!(
        ledger.call_names(),
        vec!["get_balance", "get_nonce", "broadcast", "get_receipt"]
    );
}

#[tokio::test]
async fn test_failed_deposit_is_canceled_with_tx_hash() {
    let ledger = FakeLedger::new();
    ledger.set_balance(POOL_ADDRESS, ether(100));
    ledger.auto_receipt(ReceiptStatus::Failed);
    let provider = active_provider(&ledger).await;

    let deposit = provider.deposit(Decimal::from(3), USER_ADDRESS).await;

    assert!(deposit.is_error);
    assert_eq!(deposit.kind(), Some(ErrorKind::TransactionFailed));
    assert_eq!(deposit.value.status, BridgeTransactionStatus::Canceled);
    assert_eq!(deposit.value.transaction_id, "tx1");
}

// ============ NFT 桥 ============

#[tokio::test]
async fn test_lock_and_unlock_produce_distinct_transactions() {
    let ledger = FakeLedger::new();
    let provider = active_provider(&ledger).await;
    let request = nft_request("7");

    let lock = provider.lock_nft(&request, USER_KEY).await;
    let lock_snapshot = lock.value.clone();
    let unlock = provider.unlock_nft(&request).await;

    assert!(!lock.is_error, "{}", lock.message);
    assert!(!unlock.is_error, "{}", unlock.message);
    assert_eq!(lock.value.status, BridgeTransactionStatus::Pending);
    assert_eq!(unlock.value.status, BridgeTransactionStatus::Pending);
    assert_ne!(lock.value.transaction_id, unlock.value.transaction_id);
    assert_eq!(lock.value, lock_snapshot);

    // lock 由持有人签名，unlock 由桥池签名，均发往 NFT 合约
    let raw = ledger.raw_broadcasts();
    let lock_tx = decode_broadcast(&raw[0]);
    let unlock_tx = decode_broadcast(&raw[1]);
    assert_eq!(lock_tx.from, USER_ADDRESS);
    assert_eq!(unlock_tx.from, POOL_ADDRESS);
    for sent in [&lock_tx, &unlock_tx] {
        assert_eq!(sent.to().as_deref(), Some(NFT_CONTRACT));
        assert_eq!(sent.tx.gas(), Some(&U256::from(120_000)));
    }
}

/// 桥合约 ABI：sendNFT(address,address,uint256,string,string,uint256,string)
const SEND_NFT_INPUTS: [ParamType; 7] = [
    ParamType::Address,
    ParamType::Address,
    ParamType::Uint(256),
    ParamType::String,
    ParamType::String,
    ParamType::Uint(256),
    ParamType::String,
];

/// 校验选择器并按输入类型解码参数
fn decode_calldata(sent: &Broadcast, name: &str, inputs: &[ParamType]) -> Vec<Token> {
    let data = sent.tx.data().expect("contract calldata");
    assert_eq!(data[..4], abi::short_signature(name, inputs));
    abi::decode(inputs, &data[4..]).expect("abi arguments")
}

fn address(value: &str) -> Token {
    Token::Address(value.parse::<Address>().expect("address"))
}

#[tokio::test]
async fn test_nft_bridge_calldata_matches_contract_abi() {
    let ledger = FakeLedger::new();
    let provider = active_provider(&ledger).await;
    let request = nft_request("7");

    assert!(!provider.lock_nft(&request, USER_KEY).await.is_error);
    assert!(!provider.unlock_nft(&request).await.is_error);
    let mint = provider
        .mint_nft(&MintNftRequest {
            metadata_url: "ipfs://bafy/7.json".into(),
            recipient_address: USER_ADDRESS.into(),
            memo: String::new(),
        })
        .await;
    assert!(!mint.is_error, "{}", mint.message);

    let raw = ledger.raw_broadcasts();
    assert_eq!(hex::encode(abi::short_signature("sendNFT", &SEND_NFT_INPUTS)), "79d98831");

    // lock：持有人 → 桥池，本链 EVM → 对端 Stacks
    let lock = decode_calldata(&decode_broadcast(&raw[0]), "sendNFT", &SEND_NFT_INPUTS);
    assert_eq!(
        lock,
        vec![
            address(USER_ADDRESS),
            address(POOL_ADDRESS),
            Token::Uint(U256::from(7)),
            Token::String("EVM".into()),
            Token::String("Stacks".into()),
            Token::Uint(U256::one()),
            Token::String("bridge".into()),
        ]
    );

    // unlock：桥池 → 持有人，方向相反
    let unlock = decode_calldata(&decode_broadcast(&raw[1]), "sendNFT", &SEND_NFT_INPUTS);
    assert_eq!(
        unlock,
        vec![
            address(POOL_ADDRESS),
            address(USER_ADDRESS),
            Token::Uint(U256::from(7)),
            Token::String("Stacks".into()),
            Token::String("EVM".into()),
            Token::Uint(U256::one()),
            Token::String("bridge".into()),
        ]
    );

    let minted = decode_calldata(
        &decode_broadcast(&raw[2]),
        "mint",
        &[ParamType::Address, ParamType::String],
    );
    assert_eq!(
        minted,
        vec![address(USER_ADDRESS), Token::String("ipfs://bafy/7.json".into())]
    );
}

#[tokio::test]
async fn test_invalid_token_id_is_rejected_before_broadcast() {
    let ledger = FakeLedger::new();
    let provider = active_provider(&ledger).await;

    let result = provider.lock_nft(&nft_request("seven"), USER_KEY).await;

    assert_eq!(result.kind(), Some(ErrorKind::InvalidRequest));
    assert_eq!(result.value.status, BridgeTransactionStatus::Canceled);
    assert_eq!(ledger.broadcast_count(), 0);
}

#[tokio::test]
async fn test_burn_without_burnable_contract_is_not_supported() {
    let ledger = FakeLedger::new();
    let provider = active_provider(&ledger).await;

    let result = provider
        .burn_nft(&BurnNftRequest {
            token_address: NFT_CONTRACT.into(),
            token_id: "7".into(),
            owner_private_key: USER_KEY.into(),
        })
        .await;

    assert!(result.is_error);
    assert_eq!(result.kind(), Some(ErrorKind::NotSupported));
    assert_eq!(ledger.broadcast_count(), 0);
}

#[tokio::test]
async fn test_burn_with_burnable_contract_completes() {
    let ledger = FakeLedger::new();
    ledger.auto_receipt(ReceiptStatus::Success);
    let mut config = evm_config();
    config.nft_burn_enabled = true;
    let provider = EvmProvider::with_client(config, ledger.clone());
    assert!(!provider.activate().await.is_error);

    let result = provider
        .burn_nft(&BurnNftRequest {
            token_address: NFT_CONTRACT.into(),
            token_id: "7".into(),
            owner_private_key: USER_KEY.into(),
        })
        .await;

    assert!(!result.is_error, "{}", result.message);
    assert_eq!(result.value.status, BridgeTransactionStatus::Completed);
    let sent = decode_broadcast(&ledger.raw_broadcasts()[0]);
    assert_eq!(sent.from, USER_ADDRESS);
    let args = decode_calldata(&sent, "burn", &[ParamType::Uint(256)]);
    assert_eq!(args, vec![Token::Uint(U256::from(7))]);
}

#[tokio::test]
async fn test_deposit_nft_mints_on_bridge_contract() {
    let ledger = FakeLedger::new();
    let provider = active_provider(&ledger).await;

    let result = provider
        .deposit_nft(&MintNftRequest {
            metadata_url: "ipfs://bafy/7.json".into(),
            recipient_address: USER_ADDRESS.into(),
            memo: String::new(),
        })
        .await;

    assert!(!result.is_error, "{}", result.message);
    assert_eq!(result.value.status, BridgeTransactionStatus::Pending);
    let sent = decode_broadcast(&ledger.raw_broadcasts()[0]);
    assert_eq!(sent.to().as_deref(), Some(NFT_CONTRACT));
    assert_eq!(sent.from, POOL_ADDRESS);
}

#[tokio::test]
async fn test_withdraw_nft_passes_through_leg_error() {
    let ledger = FakeLedger::new();
    let provider = active_provider(&ledger).await;

    let result = provider.withdraw_nft(&nft_request("x"), USER_KEY).await;

    assert!(result.is_error);
    assert_eq!(result.kind(), Some(ErrorKind::InvalidRequest));
    assert!(result
        .value
        .error_message
        .as_deref()
        .unwrap_or_default()
        .contains("Invalid token id"));
}

// ============ ERC-20 ============

const TOKEN: &str = "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512";

fn selector(name: &str, inputs: &[ParamType]) -> [u8; 4] {
    abi::short_signature(name, inputs)
}

/// 6 位精度代币，持有 2.5 个
fn stub_token(ledger: &FakeLedger) {
    ledger.set_call_result(selector("decimals", &[]), abi::encode(&[Token::Uint(U256::from(6))]));
    ledger.set_call_result(
        selector("balanceOf", &[ParamType::Address]),
        abi::encode(&[Token::Uint(U256::from(2_500_000u64))]),
    );
}

#[tokio::test]
async fn test_token_balance_uses_token_decimals() {
    let ledger = FakeLedger::new();
    stub_token(&ledger);
    let provider = active_provider(&ledger).await;

    let balance = provider.get_token_balance(TOKEN, USER_ADDRESS).await;

    assert!(!balance.is_error, "{}", balance.message);
    assert_eq!(balance.value, Decimal::new(25, 1));
}

#[tokio::test]
async fn test_lock_token_transfers_to_pool_and_confirms() {
    let ledger = FakeLedger::new();
    stub_token(&ledger);
    ledger.auto_receipt(ReceiptStatus::Success);
    let provider = active_provider(&ledger).await;

    let result = provider.lock_token(TOKEN, USER_KEY, Decimal::from(2)).await;

    assert!(!result.is_error, "{}", result.message);
    assert_eq!(result.value, "tx1");

    let sent = decode_broadcast(&ledger.raw_broadcasts()[0]);
    assert_eq!(sent.to().as_deref(), Some(TOKEN));
    let data = sent.tx.data().expect("transfer calldata").to_vec();
    assert_eq!(data[..4], selector("transfer", &[ParamType::Address, ParamType::Uint(256)]));
    let args = abi::decode(&[ParamType::Address, ParamType::Uint(256)], &data[4..]).unwrap();
    assert_eq!(
        args,
        vec![
            Token::Address(POOL_ADDRESS.parse().unwrap()),
            Token::Uint(U256::from(2_000_000u64)),
        ]
    );
}

#[tokio::test]
async fn test_token_transfer_over_balance_never_broadcasts() {
    let ledger = FakeLedger::new();
    stub_token(&ledger);
    let provider = active_provider(&ledger).await;

    let result = provider
        .send_token(TOKEN, USER_KEY, POOL_ADDRESS, Decimal::from(3))
        .await;

    assert_eq!(result.kind(), Some(ErrorKind::InsufficientBalance));
    assert_eq!(ledger.broadcast_count(), 0);
}

// ============ 账户 ============

#[tokio::test]
async fn test_account_balance_uses_chain_decimals() {
    let ledger = FakeLedger::new();
    ledger.set_balance(USER_ADDRESS, ether(3) / 2);
    let provider = active_provider(&ledger).await;

    let balance = provider.get_account_balance(USER_ADDRESS).await;

    assert!(!balance.is_error);
    assert_eq!(balance.value, Decimal::new(15, 1));
}

#[test]
fn test_restore_account_is_deterministic() {
    let ledger = FakeLedger::new();
    let provider = provider(&ledger);
    let phrase = "test test test test test test test test test test test junk";

    let wallet = provider.restore_account(phrase);

    assert!(!wallet.is_error, "{}", wallet.message);
    assert_eq!(wallet.value.address, USER_ADDRESS);
    assert_eq!(wallet.value.chain_id, 31337);
    assert!(provider.restore_account("not a mnemonic").is_error);
}
