use std::str::FromStr;

use alloy_primitives::{Address, Sign, I256, U256};
use serde_json::Value;

use super::types::AbiType;
use crate::error::{Result, ToolkitError};

/// A value tagged with the ABI type it encodes as.
///
/// Integers carry their declared bit width so decoding reproduces the exact
/// type that was encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiValue {
    Uint(U256, usize),
    Int(I256, usize),
    Bool(bool),
    Address(Address),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
    FixedArray(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
    Function([u8; 24]),
}

impl AbiValue {
    pub fn as_uint(&self) -> Option<U256> {
        match self {
            AbiValue::Uint(v, _) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<I256> {
        match self {
            AbiValue::Int(v, _) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            AbiValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AbiValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Coerce a native JSON value into the canonical representation of `ty`.
    pub fn coerce(ty: &AbiType, value: &Value) -> Result<Self> {
        let mismatch = || {
            ToolkitError::AbiEncodingFailed(format!("cannot coerce {} to {}", value, ty))
        };

        match ty {
            AbiType::Uint(bits) => {
                let v = coerce_uint(value).ok_or_else(mismatch)?;
                if v.bit_len() > *bits {
                    return Err(ToolkitError::AbiEncodingFailed(format!(
                        "{} overflows uint{}",
                        v, bits
                    )));
                }
                Ok(AbiValue::Uint(v, *bits))
            }
            AbiType::Int(bits) => {
                let v = coerce_int(value).ok_or_else(mismatch)?;
                if !int_fits(v, *bits) {
                    return Err(ToolkitError::AbiEncodingFailed(format!(
                        "{} overflows int{}",
                        v, bits
                    )));
                }
                Ok(AbiValue::Int(v, *bits))
            }
            AbiType::Bool => match value {
                Value::Bool(b) => Ok(AbiValue::Bool(*b)),
                Value::String(s) if s == "true" => Ok(AbiValue::Bool(true)),
                Value::String(s) if s == "false" => Ok(AbiValue::Bool(false)),
                _ => Err(mismatch()),
            },
            AbiType::Address => match value {
                Value::String(s) => Address::from_str(s.trim())
                    .map(AbiValue::Address)
                    .map_err(|_| mismatch()),
                Value::Array(_) => {
                    let bytes = coerce_bytes(value).ok_or_else(mismatch)?;
                    if bytes.len() != 20 {
                        return Err(mismatch());
                    }
                    Ok(AbiValue::Address(Address::from_slice(&bytes)))
                }
                _ => Err(mismatch()),
            },
            AbiType::FixedBytes(n) => {
                let bytes = coerce_bytes(value).ok_or_else(mismatch)?;
                if bytes.len() > *n {
                    return Err(ToolkitError::AbiEncodingFailed(format!(
                        "{} bytes do not fit bytes{}",
                        bytes.len(),
                        n
                    )));
                }
                let mut fixed = bytes;
                fixed.resize(*n, 0);
                Ok(AbiValue::FixedBytes(fixed))
            }
            AbiType::Bytes => coerce_bytes(value)
                .map(AbiValue::Bytes)
                .ok_or_else(mismatch),
            AbiType::String => match value {
                Value::String(s) => Ok(AbiValue::String(s.clone())),
                _ => Err(mismatch()),
            },
            AbiType::Array(inner) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .map(|item| Self::coerce(inner, item))
                    .collect::<Result<Vec<_>>>()
                    .map(AbiValue::Array)
            }
            AbiType::FixedArray(inner, n) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                if items.len() != *n {
                    return Err(ToolkitError::AbiEncodingFailed(format!(
                        "expected {} elements for {}, got {}",
                        n,
                        ty,
                        items.len()
                    )));
                }
                items
                    .iter()
                    .map(|item| Self::coerce(inner, item))
                    .collect::<Result<Vec<_>>>()
                    .map(AbiValue::FixedArray)
            }
            AbiType::Tuple(fields) => {
                let items = value.as_array().ok_or_else(mismatch)?;
                if items.len() != fields.len() {
                    return Err(mismatch());
                }
                fields
                    .iter()
                    .zip(items)
                    .map(|(field, item)| Self::coerce(field, item))
                    .collect::<Result<Vec<_>>>()
                    .map(AbiValue::Tuple)
            }
            AbiType::Function => {
                let bytes = coerce_bytes(value).ok_or_else(mismatch)?;
                let function: [u8; 24] = bytes.as_slice().try_into().map_err(|_| mismatch())?;
                Ok(AbiValue::Function(function))
            }
        }
    }

    /// Render as JSON: integers as decimal strings, byte values as 0x-hex.
    pub fn to_json(&self) -> Value {
        match self {
            AbiValue::Uint(v, _) => Value::String(v.to_string()),
            AbiValue::Int(v, _) => Value::String(v.to_string()),
            AbiValue::Bool(b) => Value::Bool(*b),
            AbiValue::Address(a) => Value::String(a.to_checksum(None)),
            AbiValue::FixedBytes(b) | AbiValue::Bytes(b) => {
                Value::String(format!("0x{}", hex::encode(b)))
            }
            AbiValue::Function(f) => Value::String(format!("0x{}", hex::encode(f))),
            AbiValue::String(s) => Value::String(s.clone()),
            AbiValue::Array(items) | AbiValue::FixedArray(items) | AbiValue::Tuple(items) => {
                Value::Array(items.iter().map(AbiValue::to_json).collect())
            }
        }
    }
}

pub(crate) fn int_fits(v: I256, bits: usize) -> bool {
    if bits >= 256 {
        return true;
    }
    let max = I256::from_raw((U256::from(1u8) << (bits - 1)) - U256::from(1u8));
    let min = -max - I256::ONE;
    v >= min && v <= max
}

/// 2^53: above this, JSON floats no longer hold every integer exactly.
const MAX_EXACT_FLOAT: f64 = 9_007_199_254_740_992.0;

fn coerce_uint(value: &Value) -> Option<U256> {
    match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(U256::from(u))
            } else {
                // Whole, non-negative floats within the exactly representable range.
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= MAX_EXACT_FLOAT)
                    .map(|f| U256::from(f as u64))
            }
        }
        Value::String(s) => U256::from_str(s.trim()).ok(),
        _ => None,
    }
}

fn coerce_int(value: &Value) -> Option<I256> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(I256::try_from(i).ok()?)
            } else if let Some(u) = n.as_u64() {
                I256::checked_from_sign_and_abs(Sign::Positive, U256::from(u))
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() <= MAX_EXACT_FLOAT)
                    .and_then(|f| I256::try_from(f as i64).ok())
            }
        }
        Value::String(s) => {
            let s = s.trim();
            let (sign, digits) = match s.strip_prefix('-') {
                Some(rest) => (Sign::Negative, rest),
                None => (Sign::Positive, s),
            };
            let abs = U256::from_str(digits).ok()?;
            I256::checked_from_sign_and_abs(sign, abs)
        }
        _ => None,
    }
}

/// 0x-prefixed strings are hex; other strings are taken as raw UTF-8;
/// arrays must hold byte-sized numbers.
fn coerce_bytes(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex_str) => hex::decode(hex_str).ok(),
            None => Some(s.as_bytes().to_vec()),
        },
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
            .collect(),
        _ => None,
    }
}
