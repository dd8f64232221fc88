//! 交易签名接口

use crate::{domain::UnsignedTransaction, error::ProviderResult};

/// 本地签名器：持有私钥，输出可直接广播的原始交易字节
pub trait TransactionSigner: Send + Sync {
    /// 签名账户地址（链原生格式）
    fn address(&self) -> String;

    fn sign(&self, tx: &UnsignedTransaction) -> ProviderResult<Vec<u8>>;
}
