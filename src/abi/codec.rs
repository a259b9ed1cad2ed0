use alloy_primitives::{Address, I256, U256};
use serde_json::Value;
use tracing::debug;

use super::contract::AbiMethod;
use super::types::AbiType;
use super::value::AbiValue;
use crate::error::{Result, ToolkitError};

const WORD: usize = 32;

/// Decoded return data of a method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnValues {
    Empty,
    Single(AbiValue),
    /// Values in output declaration order
    Multiple(Vec<AbiValue>),
}

impl ReturnValues {
    pub fn into_vec(self) -> Vec<AbiValue> {
        match self {
            ReturnValues::Empty => Vec::new(),
            ReturnValues::Single(v) => vec![v],
            ReturnValues::Multiple(vs) => vs,
        }
    }

    pub fn single(&self) -> Option<&AbiValue> {
        match self {
            ReturnValues::Single(v) => Some(v),
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ReturnValues::Empty => Value::Null,
            ReturnValues::Single(v) => v.to_json(),
            ReturnValues::Multiple(vs) => Value::Array(vs.iter().map(AbiValue::to_json).collect()),
        }
    }
}

/// Calldata for `method`: selector followed by the packed arguments.
///
/// Arguments past the declared inputs are ignored; a shorter list encodes
/// only the leading inputs. Constructor arguments carry no selector.
pub fn encode_call(method: &AbiMethod, args: &[Value]) -> Result<Vec<u8>> {
    let count = args.len().min(method.inputs.len());
    if count < method.inputs.len() {
        debug!(
            "Encoding {} of {} inputs for {}",
            count,
            method.inputs.len(),
            method.name
        );
    }

    let mut types = Vec::with_capacity(count);
    let mut values = Vec::with_capacity(count);
    for (param, arg) in method.inputs.iter().zip(args) {
        values.push(AbiValue::coerce(&param.ty, arg)?);
        types.push(param.ty.clone());
    }

    let packed = encode(&types, &values)?;
    if method.name.is_empty() {
        return Ok(packed);
    }

    let mut calldata = Vec::with_capacity(4 + packed.len());
    calldata.extend_from_slice(&method.selector);
    calldata.extend_from_slice(&packed);
    Ok(calldata)
}

/// Decode `data` against the method's outputs.
pub fn decode_return(method: &AbiMethod, data: &[u8]) -> Result<ReturnValues> {
    if method.outputs.is_empty() {
        return Ok(ReturnValues::Empty);
    }
    let mut values = decode(&method.output_types(), data)?;
    if values.len() == 1 {
        Ok(ReturnValues::Single(values.remove(0)))
    } else {
        Ok(ReturnValues::Multiple(values))
    }
}

/// Pack a value sequence: static values inline, dynamic values behind an
/// offset word with their contents after all heads.
pub fn encode(types: &[AbiType], values: &[AbiValue]) -> Result<Vec<u8>> {
    if types.len() != values.len() {
        return Err(ToolkitError::AbiEncodingFailed(format!(
            "{} values for {} types",
            values.len(),
            types.len()
        )));
    }

    let heads_len = types
        .iter()
        .fold(0usize, |acc, ty| acc.saturating_add(ty.head_size()));
    let mut head = Vec::new();
    let mut tail = Vec::new();

    for (ty, value) in types.iter().zip(values) {
        if ty.is_dynamic() {
            head.extend_from_slice(&usize_word(heads_len.saturating_add(tail.len())));
            tail.extend(encode_value(ty, value)?);
        } else {
            head.extend(encode_value(ty, value)?);
        }
    }

    head.extend(tail);
    Ok(head)
}

fn encode_value(ty: &AbiType, value: &AbiValue) -> Result<Vec<u8>> {
    match (ty, value) {
        (AbiType::Uint(_), AbiValue::Uint(v, _)) => Ok(v.to_be_bytes::<32>().to_vec()),
        (AbiType::Int(_), AbiValue::Int(v, _)) => Ok(v.into_raw().to_be_bytes::<32>().to_vec()),
        (AbiType::Bool, AbiValue::Bool(b)) => {
            let mut word = [0u8; WORD];
            word[WORD - 1] = u8::from(*b);
            Ok(word.to_vec())
        }
        (AbiType::Address, AbiValue::Address(a)) => {
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(a.as_slice());
            Ok(word.to_vec())
        }
        (AbiType::FixedBytes(n), AbiValue::FixedBytes(b)) if b.len() <= *n => {
            let mut word = [0u8; WORD];
            word[..b.len()].copy_from_slice(b);
            Ok(word.to_vec())
        }
        (AbiType::Function, AbiValue::Function(f)) => {
            let mut word = [0u8; WORD];
            word[..24].copy_from_slice(f);
            Ok(word.to_vec())
        }
        (AbiType::Bytes, AbiValue::Bytes(b)) => Ok(encode_packed_bytes(b)),
        (AbiType::String, AbiValue::String(s)) => Ok(encode_packed_bytes(s.as_bytes())),
        (AbiType::Array(inner), AbiValue::Array(items)) => {
            let types = vec![(**inner).clone(); items.len()];
            let mut out = usize_word(items.len()).to_vec();
            out.extend(encode(&types, items)?);
            Ok(out)
        }
        (AbiType::FixedArray(inner, n), AbiValue::FixedArray(items)) if items.len() == *n => {
            let types = vec![(**inner).clone(); *n];
            encode(&types, items)
        }
        (AbiType::Tuple(fields), AbiValue::Tuple(items)) => encode(fields, items),
        _ => Err(ToolkitError::AbiEncodingFailed(format!(
            "value {:?} does not match type {}",
            value, ty
        ))),
    }
}

fn encode_packed_bytes(bytes: &[u8]) -> Vec<u8> {
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded);
    out.extend_from_slice(&usize_word(bytes.len()));
    out.extend_from_slice(bytes);
    out.resize(WORD + padded, 0);
    out
}

fn usize_word(n: usize) -> [u8; WORD] {
    U256::from(n).to_be_bytes::<32>()
}

/// Unpack a value sequence. Every offset and length is bounds-checked.
pub fn decode(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>> {
    let mut values = Vec::with_capacity(types.len());
    let mut cursor = 0;

    for ty in types {
        if ty.is_dynamic() {
            let offset = read_usize(data, cursor)?;
            if offset > data.len() {
                return Err(out_of_bounds("offset", offset, data.len()));
            }
            values.push(decode_value(ty, &data[offset..])?);
            cursor += WORD;
        } else {
            let end = cursor.saturating_add(ty.head_size());
            if end > data.len() {
                return Err(out_of_bounds("value", end, data.len()));
            }
            values.push(decode_value(ty, &data[cursor..])?);
            cursor = end;
        }
    }

    Ok(values)
}

fn decode_value(ty: &AbiType, data: &[u8]) -> Result<AbiValue> {
    match ty {
        AbiType::Uint(bits) => {
            let word = read_word(data, 0)?;
            let narrowed = &word[WORD - bits / 8..];
            Ok(AbiValue::Uint(U256::from_be_slice(narrowed), *bits))
        }
        AbiType::Int(bits) => {
            let word = read_word(data, 0)?;
            let narrowed = &word[WORD - bits / 8..];
            let fill = if narrowed[0] & 0x80 != 0 { 0xff } else { 0x00 };
            let mut extended = [fill; WORD];
            extended[WORD - narrowed.len()..].copy_from_slice(narrowed);
            Ok(AbiValue::Int(
                I256::from_raw(U256::from_be_bytes(extended)),
                *bits,
            ))
        }
        AbiType::Bool => {
            let word = read_word(data, 0)?;
            if word[..WORD - 1].iter().any(|b| *b != 0) || word[WORD - 1] > 1 {
                return Err(ToolkitError::AbiDecodingFailed(format!(
                    "improperly encoded boolean 0x{}",
                    hex::encode(word)
                )));
            }
            Ok(AbiValue::Bool(word[WORD - 1] == 1))
        }
        AbiType::Address => {
            let word = read_word(data, 0)?;
            Ok(AbiValue::Address(Address::from_slice(&word[12..])))
        }
        AbiType::FixedBytes(n) => {
            let word = read_word(data, 0)?;
            Ok(AbiValue::FixedBytes(word[..*n].to_vec()))
        }
        AbiType::Function => {
            let word = read_word(data, 0)?;
            if word[24..].iter().any(|b| *b != 0) {
                return Err(ToolkitError::AbiDecodingFailed(format!(
                    "improperly padded function 0x{}",
                    hex::encode(word)
                )));
            }
            let mut function = [0u8; 24];
            function.copy_from_slice(&word[..24]);
            Ok(AbiValue::Function(function))
        }
        AbiType::Bytes => read_packed_bytes(data).map(|b| AbiValue::Bytes(b.to_vec())),
        AbiType::String => {
            let bytes = read_packed_bytes(data)?;
            String::from_utf8(bytes.to_vec())
                .map(AbiValue::String)
                .map_err(|e| ToolkitError::AbiDecodingFailed(format!("invalid utf-8 string: {}", e)))
        }
        AbiType::Array(inner) => {
            let len = read_usize(data, 0)?;
            let body = &data[WORD..];
            // Every element occupies at least one head word.
            if len.saturating_mul(WORD) > body.len() {
                return Err(out_of_bounds("array", len.saturating_mul(WORD), body.len()));
            }
            let types = vec![(**inner).clone(); len];
            decode(&types, body).map(AbiValue::Array)
        }
        AbiType::FixedArray(inner, n) => {
            if n.saturating_mul(WORD) > data.len() {
                return Err(out_of_bounds("fixed array", n.saturating_mul(WORD), data.len()));
            }
            let types = vec![(**inner).clone(); *n];
            decode(&types, data).map(AbiValue::FixedArray)
        }
        AbiType::Tuple(fields) => decode(fields, data).map(AbiValue::Tuple),
    }
}

fn read_word(data: &[u8], at: usize) -> Result<[u8; WORD]> {
    let end = at
        .checked_add(WORD)
        .ok_or_else(|| out_of_bounds("word", usize::MAX, data.len()))?;
    let slice = data
        .get(at..end)
        .ok_or_else(|| out_of_bounds("word", end, data.len()))?;
    let mut word = [0u8; WORD];
    word.copy_from_slice(slice);
    Ok(word)
}

fn read_usize(data: &[u8], at: usize) -> Result<usize> {
    let value = U256::from_be_bytes(read_word(data, at)?);
    usize::try_from(value)
        .map_err(|_| ToolkitError::AbiDecodingFailed(format!("length or offset {} too large", value)))
}

/// Length word followed by that many bytes.
fn read_packed_bytes(data: &[u8]) -> Result<&[u8]> {
    let len = read_usize(data, 0)?;
    let end = WORD
        .checked_add(len)
        .ok_or_else(|| out_of_bounds("bytes", usize::MAX, data.len()))?;
    data.get(WORD..end)
        .ok_or_else(|| out_of_bounds("bytes", end, data.len()))
}

fn out_of_bounds(what: &str, needed: usize, available: usize) -> ToolkitError {
    ToolkitError::AbiDecodingFailed(format!(
        "{} out of bounds: need {} bytes, have {}",
        what, needed, available
    ))
}
