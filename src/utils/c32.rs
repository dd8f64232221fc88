//! Crockford base32 (c32) 与 c32check 地址编码
//!
//! Stacks 地址格式：`S` + 版本字符 + c32(hash160 || checksum)，
//! checksum 为 sha256(sha256(version || hash160)) 的前 4 字节。

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};

const C32_ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

fn c32_digit(c: u8) -> Option<u8> {
    // 兼容易混淆字符
    let c = match c.to_ascii_uppercase() {
        b'O' => b'0',
        b'L' | b'I' => b'1',
        other => other,
    };
    C32_ALPHABET.iter().position(|&x| x == c).map(|p| p as u8)
}

pub fn c32_encode(input: &[u8]) -> String {
    let mut result: Vec<u8> = Vec::with_capacity(input.len() * 8 / 5 + 1);
    let mut carry: u16 = 0;
    let mut carry_bits: u32 = 0;

    for byte in input.iter().rev() {
        carry |= (*byte as u16) << carry_bits;
        carry_bits += 8;
        while carry_bits >= 5 {
            result.push(C32_ALPHABET[(carry & 0x1f) as usize]);
            carry >>= 5;
            carry_bits -= 5;
        }
    }
    if carry_bits > 0 {
        result.push(C32_ALPHABET[(carry & 0x1f) as usize]);
    }

    // 去掉编码产生的高位 0，再按输入的前导 0 字节补回
    while result.last() == Some(&C32_ALPHABET[0]) {
        result.pop();
    }
    for _ in input.iter().take_while(|b| **b == 0) {
        result.push(C32_ALPHABET[0]);
    }

    result.reverse();
    String::from_utf8_lossy(&result).into_owned()
}

pub fn c32_decode(input: &str) -> Result<Vec<u8>> {
    let digits = input
        .bytes()
        .map(|c| c32_digit(c).with_context(|| format!("Invalid c32 character: {}", c as char)))
        .collect::<Result<Vec<u8>>>()?;

    let mut result: Vec<u8> = Vec::with_capacity(digits.len() * 5 / 8 + 1);
    let mut carry: u16 = 0;
    let mut carry_bits: u32 = 0;

    for digit in digits.iter().rev() {
        carry |= (*digit as u16) << carry_bits;
        carry_bits += 5;
        if carry_bits >= 8 {
            result.push((carry & 0xff) as u8);
            carry >>= 8;
            carry_bits -= 8;
        }
    }
    if carry_bits > 0 && carry > 0 {
        result.push(carry as u8);
    }

    while result.last() == Some(&0) {
        result.pop();
    }
    for _ in digits.iter().take_while(|d| **d == 0) {
        result.push(0);
    }

    result.reverse();
    Ok(result)
}

fn checksum(version: u8, data: &[u8]) -> [u8; 4] {
    let mut hasher = Sha256::new();
    hasher.update([version]);
    hasher.update(data);
    let first = hasher.finalize();
    let second = Sha256::digest(first);
    let mut out = [0u8; 4];
    out.copy_from_slice(&second[..4]);
    out
}

/// 编码 Stacks 地址（`SP...` / `ST...`）
pub fn encode_address(version: u8, hash160: &[u8; 20]) -> Result<String> {
    if version >= 32 {
        anyhow::bail!("Invalid c32 version: {}", version);
    }
    let mut payload = hash160.to_vec();
    payload.extend_from_slice(&checksum(version, hash160));
    Ok(format!(
        "S{}{}",
        C32_ALPHABET[version as usize] as char,
        c32_encode(&payload)
    ))
}

/// 解码 Stacks 地址，返回 (version, hash160)
pub fn decode_address(address: &str) -> Result<(u8, [u8; 20])> {
    let address = address.trim();
    if address.len() < 5 || !address.starts_with('S') {
        anyhow::bail!("Invalid Stacks address: {}", address);
    }

    let version = c32_digit(address.as_bytes()[1])
        .with_context(|| format!("Invalid Stacks address version: {}", address))?;
    let decoded = c32_decode(&address[2..])?;
    if decoded.len() != 24 {
        anyhow::bail!(
            "Invalid Stacks address payload length: expected 24, got {}",
            decoded.len()
        );
    }

    let (data, sum) = decoded.split_at(20);
    if checksum(version, data) != sum {
        anyhow::bail!("Stacks address checksum mismatch: {}", address);
    }

    let mut hash = [0u8; 20];
    hash.copy_from_slice(data);
    Ok((version, hash))
}
