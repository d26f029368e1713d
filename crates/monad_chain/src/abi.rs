//! Minimal Solidity ABI support for the contract surfaces the templates use:
//! static `address` / `uint256` arguments and single-value return data.

use num_bigint::BigUint;
use tiny_keccak::{Hasher, Keccak};

use crate::address::Address;

const WORD: usize = 32;

/// Errors while encoding calls or decoding return data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AbiError {
    #[error("return data too short: expected at least {expected} bytes, got {actual}")]
    DataTooShort { expected: usize, actual: usize },

    #[error("invalid hex data: {0}")]
    InvalidHex(String),

    #[error("value out of range for {ty}")]
    OutOfRange { ty: &'static str },

    #[error("uint256 overflow")]
    Overflow,

    #[error("invalid ABI encoding: {0}")]
    InvalidEncoding(String),
}

/// A static call argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(Address),
    Uint(BigUint),
}

impl Token {
    fn encode_word(&self) -> Result<[u8; WORD], AbiError> {
        let mut word = [0u8; WORD];
        match self {
            Token::Address(addr) => word[12..].copy_from_slice(addr.as_bytes()),
            Token::Uint(n) => {
                let bytes = n.to_bytes_be();
                if bytes.len() > WORD {
                    return Err(AbiError::Overflow);
                }
                word[WORD - bytes.len()..].copy_from_slice(&bytes);
            }
        }
        Ok(word)
    }
}

impl From<Address> for Token {
    fn from(value: Address) -> Self {
        Token::Address(value)
    }
}

impl From<BigUint> for Token {
    fn from(value: BigUint) -> Self {
        Token::Uint(value)
    }
}

impl From<u64> for Token {
    fn from(value: u64) -> Self {
        Token::Uint(BigUint::from(value))
    }
}

/// A contract function identified by its canonical signature,
/// e.g. `balanceOf(address)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    signature: &'static str,
}

impl Function {
    pub const fn new(signature: &'static str) -> Self {
        Self { signature }
    }

    pub fn signature(&self) -> &'static str {
        self.signature
    }

    /// Function name without the parameter list.
    pub fn name(&self) -> &'static str {
        self.signature
            .split_once('(')
            .map(|(name, _)| name)
            .unwrap_or(self.signature)
    }

    pub fn selector(&self) -> [u8; 4] {
        selector_from_signature(self.signature)
    }

    /// Encode calldata: selector followed by one 32-byte word per argument.
    pub fn encode(&self, args: &[Token]) -> Result<Vec<u8>, AbiError> {
        let mut data = Vec::with_capacity(4 + WORD * args.len());
        data.extend_from_slice(&self.selector());
        for arg in args {
            data.extend_from_slice(&arg.encode_word()?);
        }
        Ok(data)
    }

    /// Encode calldata as a `0x`-prefixed hex string.
    pub fn encode_hex(&self, args: &[Token]) -> Result<String, AbiError> {
        Ok(to_hex(&self.encode(args)?))
    }
}

/// Compute the 4-byte selector from a canonical function signature.
pub fn selector_from_signature(canonical: &str) -> [u8; 4] {
    let mut hasher = Keccak::v256();
    hasher.update(canonical.as_bytes());
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn from_hex(data: &str) -> Result<Vec<u8>, AbiError> {
    let body = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(body).map_err(|_| AbiError::InvalidHex(data.to_string()))
}

/// `start + len`, failing on overflow. Offsets and lengths come from
/// untrusted return data.
fn checked_end(start: usize, len: usize) -> Result<usize, AbiError> {
    start
        .checked_add(len)
        .ok_or_else(|| AbiError::InvalidEncoding(format!("range {start}+{len} overflows")))
}

fn word_at(data: &[u8], offset: usize) -> Result<&[u8], AbiError> {
    let end = checked_end(offset, WORD)?;
    data.get(offset..end).ok_or(AbiError::DataTooShort {
        expected: end,
        actual: data.len(),
    })
}

fn word_as_usize(data: &[u8], offset: usize) -> Result<usize, AbiError> {
    let word = word_at(data, offset)?;
    if word[..WORD - 8].iter().any(|b| *b != 0) {
        return Err(AbiError::InvalidEncoding(format!(
            "offset or length too large at byte {offset}"
        )));
    }
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&word[WORD - 8..]);
    Ok(u64::from_be_bytes(buf) as usize)
}

pub fn decode_uint(data: &[u8]) -> Result<BigUint, AbiError> {
    Ok(BigUint::from_bytes_be(word_at(data, 0)?))
}

pub fn decode_u8(data: &[u8]) -> Result<u8, AbiError> {
    let word = word_at(data, 0)?;
    if word[..WORD - 1].iter().any(|b| *b != 0) {
        return Err(AbiError::OutOfRange { ty: "uint8" });
    }
    Ok(word[WORD - 1])
}

pub fn decode_bool(data: &[u8]) -> Result<bool, AbiError> {
    match decode_u8(data) {
        Ok(0) => Ok(false),
        Ok(1) => Ok(true),
        _ => Err(AbiError::OutOfRange { ty: "bool" }),
    }
}

pub fn decode_address(data: &[u8]) -> Result<Address, AbiError> {
    let word = word_at(data, 0)?;
    if word[..12].iter().any(|b| *b != 0) {
        return Err(AbiError::OutOfRange { ty: "address" });
    }
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[12..]);
    Ok(Address::from_bytes(bytes))
}

/// Decode a single dynamic `string` return value.
pub fn decode_string(data: &[u8]) -> Result<String, AbiError> {
    let offset = word_as_usize(data, 0)?;
    let len = word_as_usize(data, offset)?;
    let start = checked_end(offset, WORD)?;
    let end = checked_end(start, len)?;
    let bytes = data.get(start..end).ok_or(AbiError::DataTooShort {
        expected: end,
        actual: data.len(),
    })?;
    String::from_utf8(bytes.to_vec()).map_err(|e| AbiError::InvalidEncoding(e.to_string()))
}

/// ABI-encode a single `string` return value. Used by test doubles that play
/// the part of a contract.
pub fn encode_string(value: &str) -> Vec<u8> {
    let bytes = value.as_bytes();
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(2 * WORD + padded);
    out.extend_from_slice(&Token::from(WORD as u64).encode_word().unwrap_or([0u8; WORD]));
    out.extend_from_slice(
        &Token::from(bytes.len() as u64)
            .encode_word()
            .unwrap_or([0u8; WORD]),
    );
    out.extend_from_slice(bytes);
    out.resize(2 * WORD + padded, 0);
    out
}

/// ABI-encode a single static return word.
pub fn encode_word(token: &Token) -> Result<Vec<u8>, AbiError> {
    Ok(token.encode_word()?.to_vec())
}
