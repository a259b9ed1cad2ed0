use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::keccak256;
use super::types::AbiType;
use crate::error::{Result, ToolkitError};

/// ABI parameter definition as it appears in contract JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbiParam {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub indexed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<AbiParam>>,
}

impl AbiParam {
    pub fn new(name: &str, param_type: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type: param_type.to_string(),
            indexed: false,
            components: None,
        }
    }

    pub fn abi_type(&self) -> Result<AbiType> {
        AbiType::parse(&self.param_type, self.components.as_deref())
    }
}

/// ABI function, constructor or event entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbiEntry {
    #[serde(rename = "type", default = "default_entry_type")]
    pub entry_type: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
    #[serde(default)]
    pub outputs: Vec<AbiParam>,
    #[serde(default)]
    pub state_mutability: Option<String>,
    /// Pre-0.5 compilers flag read-only functions here instead.
    #[serde(default)]
    pub constant: Option<bool>,
}

fn default_entry_type() -> String {
    "function".to_string()
}

/// A named, typed parameter of a parsed method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub ty: AbiType,
}

/// Parsed method descriptor. Immutable once built.
#[derive(Debug, Clone)]
pub struct AbiMethod {
    pub name: String,
    pub inputs: Vec<Param>,
    pub outputs: Vec<Param>,
    pub selector: [u8; 4],
    pub state_mutability: String,
    constant: bool,
}

impl AbiMethod {
    fn from_entry(entry: &AbiEntry) -> Result<Self> {
        let name = entry.name.clone().unwrap_or_default();
        let inputs = parse_params(&entry.inputs)?;
        let outputs = parse_params(&entry.outputs)?;
        let signature = build_signature(&name, &inputs);
        let selector = compute_selector(&signature);

        let state_mutability = entry.state_mutability.clone().unwrap_or_else(|| {
            if entry.constant == Some(true) {
                "view".to_string()
            } else {
                "nonpayable".to_string()
            }
        });
        let constant = entry.constant.unwrap_or(false)
            || matches!(state_mutability.as_str(), "view" | "pure" | "constant");

        Ok(Self {
            name,
            inputs,
            outputs,
            selector,
            state_mutability,
            constant,
        })
    }

    /// Build a descriptor from a canonical signature such as
    /// `balanceOf(address)`, with the given output types.
    pub fn from_signature(signature: &str, outputs: &[&str]) -> Result<Self> {
        let open = signature
            .find('(')
            .ok_or_else(|| ToolkitError::InvalidAbi(format!("bad signature {:?}", signature)))?;
        let name = signature[..open].trim().to_string();
        let inputs = match AbiType::parse(&signature[open..], None)? {
            AbiType::Tuple(fields) => fields,
            _ => {
                return Err(ToolkitError::InvalidAbi(format!(
                    "bad signature {:?}",
                    signature
                )))
            }
        };
        let inputs = inputs
            .into_iter()
            .map(|ty| Param { name: String::new(), ty })
            .collect::<Vec<_>>();
        let outputs = outputs
            .iter()
            .map(|o| {
                AbiType::parse(o, None).map(|ty| Param { name: String::new(), ty })
            })
            .collect::<Result<Vec<_>>>()?;

        let selector = compute_selector(&build_signature(&name, &inputs));
        Ok(Self {
            name,
            inputs,
            outputs,
            selector,
            state_mutability: "view".to_string(),
            constant: true,
        })
    }

    /// Read-only methods may be served by `eth_call`.
    pub fn is_constant(&self) -> bool {
        self.constant
    }

    pub fn signature(&self) -> String {
        build_signature(&self.name, &self.inputs)
    }

    pub fn input_types(&self) -> Vec<AbiType> {
        self.inputs.iter().map(|p| p.ty.clone()).collect()
    }

    pub fn output_types(&self) -> Vec<AbiType> {
        self.outputs.iter().map(|p| p.ty.clone()).collect()
    }
}

/// A contract's parsed interface: functions by name plus the constructor.
#[derive(Debug, Clone, Default)]
pub struct ContractAbi {
    methods: HashMap<String, AbiMethod>,
    constructor: Option<AbiMethod>,
}

impl ContractAbi {
    pub fn from_entries(entries: &[AbiEntry]) -> Result<Self> {
        let mut abi = ContractAbi::default();

        for entry in entries {
            match entry.entry_type.as_str() {
                "function" => {
                    let method = AbiMethod::from_entry(entry)?;
                    if method.name.is_empty() {
                        return Err(ToolkitError::InvalidAbi(
                            "function entry without a name".to_string(),
                        ));
                    }
                    debug!(
                        "Parsed method: {} selector=0x{}",
                        method.signature(),
                        hex::encode(method.selector)
                    );
                    // First overload wins lookups by name.
                    abi.methods.entry(method.name.clone()).or_insert(method);
                }
                "constructor" => {
                    abi.constructor = Some(AbiMethod::from_entry(entry)?);
                }
                _ => {}
            }
        }

        Ok(abi)
    }

    /// Parse a full ABI JSON array.
    pub fn from_json(abi_json: &str) -> Result<Self> {
        let entries: Vec<AbiEntry> = serde_json::from_str(abi_json)
            .map_err(|e| ToolkitError::InvalidAbi(format!("failed to parse ABI JSON: {}", e)))?;
        Self::from_entries(&entries)
    }

    /// Method by name; the empty name selects the constructor.
    pub fn method(&self, name: &str) -> Result<&AbiMethod> {
        let found = if name.is_empty() {
            self.constructor.as_ref()
        } else {
            self.methods.get(name)
        };
        found.ok_or_else(|| ToolkitError::MethodNotFound(name.to_string()))
    }

    pub fn constructor(&self) -> Option<&AbiMethod> {
        self.constructor.as_ref()
    }

    pub fn lookup_by_selector(&self, selector: &[u8; 4]) -> Option<&AbiMethod> {
        self.methods.values().find(|m| &m.selector == selector)
    }

    pub fn methods(&self) -> impl Iterator<Item = &AbiMethod> {
        self.methods.values()
    }

    /// Calldata for the named method (or constructor arguments for `""`).
    pub fn encode_call(&self, name: &str, args: &[serde_json::Value]) -> Result<Vec<u8>> {
        super::codec::encode_call(self.method(name)?, args)
    }
}

/// First four bytes of keccak256 over a canonical signature.
/// e.g., "transfer(address,uint256)" -> 0xa9059cbb
pub fn compute_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&hash[..4]);
    selector
}

/// Canonical signature: name followed by comma-joined canonical input types.
pub fn build_signature(name: &str, inputs: &[Param]) -> String {
    let types: Vec<String> = inputs.iter().map(|p| p.ty.canonical()).collect();
    format!("{}({})", name, types.join(","))
}

fn parse_params(params: &[AbiParam]) -> Result<Vec<Param>> {
    params
        .iter()
        .map(|p| {
            Ok(Param {
                name: p.name.clone(),
                ty: p.abi_type()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ERC20_ABI: &str = r#"[
        {"type":"constructor","inputs":[{"name":"supply","type":"uint256"}],"stateMutability":"nonpayable"},
        {"type":"function","name":"balanceOf","inputs":[{"name":"owner","type":"address"}],
         "outputs":[{"name":"","type":"uint256"}],"stateMutability":"view"},
        {"type":"function","name":"transfer","inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],
         "outputs":[{"name":"","type":"bool"}],"stateMutability":"nonpayable"},
        {"type":"function","name":"symbol","inputs":[],"outputs":[{"name":"","type":"string"}],"constant":true},
        {"type":"event","name":"Transfer","inputs":[{"name":"from","type":"address","indexed":true}]}
    ]"#;

    #[test]
    fn test_compute_selector() {
        assert_eq!(compute_selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(compute_selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
    }

    #[test]
    fn test_parse_erc20() {
        let abi = ContractAbi::from_json(ERC20_ABI).unwrap();

        let balance_of = abi.method("balanceOf").unwrap();
        assert_eq!(balance_of.signature(), "balanceOf(address)");
        assert!(balance_of.is_constant());
        assert_eq!(balance_of.output_types(), vec![AbiType::Uint(256)]);

        let transfer = abi.method("transfer").unwrap();
        assert!(!transfer.is_constant());
        assert_eq!(transfer.selector, [0xa9, 0x05, 0x9c, 0xbb]);

        assert!(abi.method("symbol").unwrap().is_constant());
        assert_eq!(abi.methods().count(), 3);
    }

    #[test]
    fn test_constructor_and_missing_method() {
        let abi = ContractAbi::from_json(ERC20_ABI).unwrap();
        let ctor = abi.method("").unwrap();
        assert_eq!(ctor.input_types(), vec![AbiType::Uint(256)]);

        match abi.method("mint") {
            Err(ToolkitError::MethodNotFound(name)) => assert_eq!(name, "mint"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_lookup_by_selector() {
        let abi = ContractAbi::from_json(ERC20_ABI).unwrap();
        let method = abi.lookup_by_selector(&[0x70, 0xa0, 0x82, 0x31]).unwrap();
        assert_eq!(method.name, "balanceOf");
        assert!(abi.lookup_by_selector(&[0, 0, 0, 0]).is_none());
    }

    #[test]
    fn test_tuple_signature() {
        let json = r#"[{"type":"function","name":"submit","inputs":[
            {"name":"orders","type":"tuple[]","components":[
                {"name":"maker","type":"address"},{"name":"amount","type":"uint256"}]}
        ],"outputs":[]}]"#;
        let abi = ContractAbi::from_json(json).unwrap();
        assert_eq!(abi.method("submit").unwrap().signature(), "submit((address,uint256)[])");
    }

    #[test]
    fn test_from_signature() {
        let method = AbiMethod::from_signature("balanceOf(address)", &["uint256"]).unwrap();
        assert_eq!(method.selector, [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(method.input_types(), vec![AbiType::Address]);
        assert!(AbiMethod::from_signature("balanceOf", &[]).is_err());
    }

    #[test]
    fn test_invalid_abi() {
        assert!(matches!(
            ContractAbi::from_json("{not json"),
            Err(ToolkitError::InvalidAbi(_))
        ));
        let bad_type = r#"[{"type":"function","name":"f","inputs":[{"name":"x","type":"uint7"}]}]"#;
        assert!(ContractAbi::from_json(bad_type).is_err());
    }
}
