//! 金额单位换算
//!
//! 十进制金额 ↔ 链上最小单位（wei / microSTX / token base unit）。
//! 全程整数运算，不经过浮点。

use ethers::types::U256;
use rust_decimal::Decimal;

use crate::error::{ProviderError, ProviderResult};

/// Decimal 最大尾数 2^96 - 1
const DECIMAL_MAX_MANTISSA: u128 = 79_228_162_514_264_337_593_543_950_335;
const DECIMAL_MAX_SCALE: u32 = 28;

/// 单链最小单位配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitScale {
    pub decimals: u32,
}

impl UnitScale {
    pub const fn new(decimals: u32) -> Self {
        Self { decimals }
    }

    pub fn to_base(&self, amount: Decimal) -> ProviderResult<U256> {
        to_base_units(amount, self.decimals)
    }

    pub fn from_base(&self, value: U256) -> ProviderResult<Decimal> {
        from_base_units(value, self.decimals)
    }
}

/// 十进制金额 → 最小单位
///
/// 负数、超出最小单位精度的小数位以及溢出都会被拒绝。
pub fn to_base_units(amount: Decimal, decimals: u32) -> ProviderResult<U256> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ProviderError::invalid_request(format!(
            "Amount must not be negative: {}",
            amount
        )));
    }

    let normalized = amount.normalize();
    let mantissa = U256::from(normalized.mantissa().unsigned_abs());
    let scale = normalized.scale();

    if scale > decimals {
        return Err(ProviderError::invalid_request(format!(
            "Amount {} has more than {} decimal places",
            amount, decimals
        )));
    }

    let shift = (decimals - scale) as usize;
    if shift > 77 {
        return Err(ProviderError::invalid_request(format!(
            "Unsupported decimals: {}",
            decimals
        )));
    }

    mantissa
        .checked_mul(U256::exp10(shift))
        .ok_or_else(|| ProviderError::invalid_request(format!("Amount overflows: {}", amount)))
}

/// 最小单位 → 十进制金额
///
/// 超出 Decimal 表示范围时截断低位小数。
pub fn from_base_units(value: U256, decimals: u32) -> ProviderResult<Decimal> {
    let mut mantissa = value;
    let mut scale = decimals;

    while scale > DECIMAL_MAX_SCALE || mantissa > U256::from(DECIMAL_MAX_MANTISSA) {
        if scale == 0 {
            return Err(ProviderError::deserialization(format!(
                "Value {} exceeds decimal range",
                value
            )));
        }
        mantissa /= U256::from(10u8);
        scale -= 1;
    }

    Decimal::try_from_i128_with_scale(mantissa.as_u128() as i128, scale)
        .map(|d| d.normalize())
        .map_err(|e| ProviderError::deserialization(format!("Invalid decimal: {}", e)))
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_ether_to_wei() {
        let wei = to_base_units(Decimal::from_str("1.5").unwrap(), 18).unwrap();
        assert_eq!(wei, U256::from(1_500_000_000_000_000_000u128));
    }

    #[test]
    fn test_no_float_truncation() {
        // 0.1 + 0.2 用浮点会出现误差
        let wei = to_base_units(Decimal::from_str("0.3").unwrap(), 18).unwrap();
        assert_eq!(wei, U256::from(300_000_000_000_000_000u128));
    }

    #[test]
    fn test_stx_scale() {
        let micro = UnitScale::new(6).to_base(Decimal::from_str("2.000001").unwrap()).unwrap();
        assert_eq!(micro, U256::from(2_000_001u64));
    }

    #[test]
    fn test_rejects_sub_unit_precision() {
        let err = to_base_units(Decimal::from_str("0.0000001").unwrap(), 6).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_rejects_negative() {
        assert!(to_base_units(Decimal::from_str("-1").unwrap(), 18).is_err());
    }

    #[test]
    fn test_from_base_units() {
        let value = from_base_units(U256::from(1_234_500_000_000_000_000u128), 18).unwrap();
        assert_eq!(value, Decimal::from_str("1.2345").unwrap());
    }

    #[test]
    fn test_from_base_units_large_value_truncates() {
        // 10^30 wei = 10^12 ETH，超出 28 位小数精度
        let value = from_base_units(U256::exp10(30), 18).unwrap();
        assert_eq!(value, Decimal::from_str("1000000000000").unwrap());
    }
}
