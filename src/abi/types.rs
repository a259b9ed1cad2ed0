use std::fmt;

use super::contract::AbiParam;
use crate::error::{Result, ToolkitError};

/// Closed description of every ABI type the codec understands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbiType {
    /// `uintN`, N in 8..=256 step 8
    Uint(usize),
    /// `intN`, N in 8..=256 step 8
    Int(usize),
    Bool,
    Address,
    /// `bytesN`, N in 1..=32
    FixedBytes(usize),
    Bytes,
    String,
    /// `T[]`
    Array(Box<AbiType>),
    /// `T[N]`
    FixedArray(Box<AbiType>, usize),
    Tuple(Vec<AbiType>),
    /// 20-byte address followed by a 4-byte selector
    Function,
}

impl AbiType {
    /// Parse a type string. Tuples take their fields from `components`.
    pub fn parse(type_str: &str, components: Option<&[AbiParam]>) -> Result<Self> {
        let type_str = type_str.trim();

        // Array suffixes bind last: `uint256[2][]` is a dynamic array of `uint256[2]`.
        if let Some(stripped) = type_str.strip_suffix(']') {
            let open = stripped
                .rfind('[')
                .ok_or_else(|| invalid_type(type_str))?;
            let inner = Self::parse(&stripped[..open], components)?;
            let len = &stripped[open + 1..];
            return if len.is_empty() {
                Ok(AbiType::Array(Box::new(inner)))
            } else {
                let n: usize = len.parse().map_err(|_| invalid_type(type_str))?;
                if n == 0 {
                    return Err(invalid_type(type_str));
                }
                Ok(AbiType::FixedArray(Box::new(inner), n))
            };
        }

        if type_str == "tuple" {
            let comps = components.ok_or_else(|| {
                ToolkitError::InvalidAbi("tuple type without components".to_string())
            })?;
            let fields = comps
                .iter()
                .map(AbiParam::abi_type)
                .collect::<Result<Vec<_>>>()?;
            return Ok(AbiType::Tuple(fields));
        }

        if let Some(inner) = type_str.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
            let fields = split_top_level(inner)
                .into_iter()
                .filter(|s| !s.is_empty())
                .map(|s| Self::parse(s, None))
                .collect::<Result<Vec<_>>>()?;
            return Ok(AbiType::Tuple(fields));
        }

        match type_str {
            "bool" => return Ok(AbiType::Bool),
            "address" => return Ok(AbiType::Address),
            "bytes" => return Ok(AbiType::Bytes),
            "string" => return Ok(AbiType::String),
            "function" => return Ok(AbiType::Function),
            "uint" => return Ok(AbiType::Uint(256)),
            "int" => return Ok(AbiType::Int(256)),
            _ => {}
        }

        if let Some(bits) = type_str.strip_prefix("uint") {
            return parse_int_width(bits, type_str).map(AbiType::Uint);
        }
        if let Some(bits) = type_str.strip_prefix("int") {
            return parse_int_width(bits, type_str).map(AbiType::Int);
        }
        if let Some(size) = type_str.strip_prefix("bytes") {
            let n: usize = size.parse().map_err(|_| invalid_type(type_str))?;
            if !(1..=32).contains(&n) {
                return Err(invalid_type(type_str));
            }
            return Ok(AbiType::FixedBytes(n));
        }

        Err(invalid_type(type_str))
    }

    /// Dynamic types are referenced from the head by an offset word.
    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_) => true,
            AbiType::FixedArray(inner, _) => inner.is_dynamic(),
            AbiType::Tuple(fields) => fields.iter().any(AbiType::is_dynamic),
            _ => false,
        }
    }

    /// Bytes occupied in the head of an enclosing sequence. Saturates at
    /// `usize::MAX` for sizes no buffer can hold.
    pub fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return 32;
        }
        match self {
            AbiType::FixedArray(inner, n) => inner.head_size().saturating_mul(*n),
            AbiType::Tuple(fields) => fields
                .iter()
                .fold(0usize, |acc, field| acc.saturating_add(field.head_size())),
            _ => 32,
        }
    }

    /// Canonical spelling used in method signatures.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiType::Uint(bits) => write!(f, "uint{}", bits),
            AbiType::Int(bits) => write!(f, "int{}", bits),
            AbiType::Bool => f.write_str("bool"),
            AbiType::Address => f.write_str("address"),
            AbiType::FixedBytes(n) => write!(f, "bytes{}", n),
            AbiType::Bytes => f.write_str("bytes"),
            AbiType::String => f.write_str("string"),
            AbiType::Array(inner) => write!(f, "{}[]", inner),
            AbiType::FixedArray(inner, n) => write!(f, "{}[{}]", inner, n),
            AbiType::Tuple(fields) => {
                f.write_str("(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", field)?;
                }
                f.write_str(")")
            }
            AbiType::Function => f.write_str("function"),
        }
    }
}

fn invalid_type(type_str: &str) -> ToolkitError {
    ToolkitError::InvalidAbi(format!("unsupported type {:?}", type_str))
}

fn parse_int_width(bits: &str, type_str: &str) -> Result<usize> {
    let bits: usize = bits.parse().map_err(|_| invalid_type(type_str))?;
    if bits == 0 || bits > 256 || bits % 8 != 0 {
        return Err(invalid_type(type_str));
    }
    Ok(bits)
}

/// Split `a,(b,c),d` on commas that are not nested in parentheses.
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts
}
