//! Utilities for the deploy scripts.

use std::{fs, path::Path};

use alloy::{
    dyn_abi::{DynSolValue, JsonAbiExt},
    json_abi::Function,
    primitives::Bytes,
};
use serde_json::{Map, Value};

use crate::{
    constants::DEPLOYMENTS_KEY,
    errors::ScriptError,
    types::{ArgValue, DeploymentRecord, Invocation},
};

impl From<&ArgValue> for DynSolValue {
    fn from(value: &ArgValue) -> Self {
        match value {
            ArgValue::Address(address) => DynSolValue::Address(*address),
            ArgValue::String(s) => DynSolValue::String(s.clone()),
            ArgValue::Uint(n) => DynSolValue::Uint(*n, 256),
            ArgValue::Bool(b) => DynSolValue::Bool(*b),
            ArgValue::Bytes(bytes) => DynSolValue::Bytes(bytes.to_vec()),
        }
    }
}

/// ABI-encode constructor arguments, to be appended to the creation bytecode
pub fn encode_constructor_args(args: &[ArgValue]) -> Vec<u8> {
    if args.is_empty() {
        return Vec::new();
    }

    DynSolValue::Tuple(args.iter().map(DynSolValue::from).collect()).abi_encode_params()
}

/// Prepare calldata, selector included, for the given invocation
pub fn encode_call(call: &Invocation) -> Result<Bytes, ScriptError> {
    let function = Function::parse(&call.signature())
        .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))?;
    let values: Vec<DynSolValue> = call.args.iter().map(DynSolValue::from).collect();

    function
        .abi_encode_input(&values)
        .map(Bytes::from)
        .map_err(|e| ScriptError::CalldataConstruction(e.to_string()))
}

/// Append creation bytecode and encoded constructor arguments
pub fn creation_code(bytecode: &Bytes, constructor_args: &[ArgValue]) -> Bytes {
    let mut code = bytecode.to_vec();
    code.extend(encode_constructor_args(constructor_args));
    code.into()
}

/// Merge the addresses of a run into the deployments file, creating it if needed.
///
/// Entries already in the file under other names are preserved.
pub fn write_deployments(file_path: &Path, record: &DeploymentRecord) -> Result<(), ScriptError> {
    let mut parsed_json = if file_path.exists() {
        let contents = fs::read_to_string(file_path)
            .map_err(|e| ScriptError::ReadDeployments(e.to_string()))?;
        serde_json::from_str::<Value>(&contents)
            .map_err(|e| ScriptError::ReadDeployments(e.to_string()))?
    } else {
        Value::Object(Map::new())
    };

    let root = parsed_json.as_object_mut().ok_or_else(|| {
        ScriptError::ReadDeployments("deployments file is not an object".to_string())
    })?;
    let deployments = root
        .entry(DEPLOYMENTS_KEY)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| {
            ScriptError::ReadDeployments(format!("`{}` is not an object", DEPLOYMENTS_KEY))
        })?;

    for (name, address) in record.iter() {
        deployments.insert(name.to_string(), Value::String(format!("{address:#x}")));
    }

    let contents = serde_json::to_string_pretty(&parsed_json)
        .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
    fs::write(file_path, contents).map_err(|e| ScriptError::WriteDeployments(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, U256};

    #[test]
    fn parameterless_initializer_is_bare_selector() {
        let calldata = encode_call(&Invocation::new("initialize", vec![])).unwrap();
        assert_eq!(calldata.to_vec(), vec![0x81, 0x29, 0xfc, 0x1c]);
    }

    #[test]
    fn call_arguments_follow_selector() {
        let pool = address!("0x00000000000000000000000000000000000000aa");
        let calldata = encode_call(&Invocation::new(
            "mintTo",
            vec![ArgValue::Address(pool), ArgValue::Uint(U256::from(1_000_000u64))],
        ))
        .unwrap();

        assert_eq!(calldata.len(), 4 + 2 * 32);
        assert_eq!(&calldata[4 + 12..4 + 32], pool.as_slice());
        assert_eq!(U256::from_be_slice(&calldata[4 + 32..]), U256::from(1_000_000u64));
    }

    #[test]
    fn constructor_args_are_appended() {
        let bytecode = Bytes::from(vec![0x60, 0x80]);
        assert_eq!(creation_code(&bytecode, &[]), bytecode);

        let code = creation_code(&bytecode, &[ArgValue::Bool(true)]);
        assert_eq!(code.len(), 2 + 32);
        assert_eq!(code[code.len() - 1], 1);
    }

    #[test]
    fn deployments_are_merged_into_existing_file() {
        let path = std::env::temp_dir().join(format!("deployments-{}.json", std::process::id()));
        let router = "0x00000000000000000000000000000000000000aa";
        fs::write(&path, format!(r#"{{ "deployments": {{ "router": "{}" }} }}"#, router)).unwrap();

        let token = address!("0x00000000000000000000000000000000000000bb");
        let mut record = DeploymentRecord::default();
        record.insert("token", token);
        write_deployments(&path, &record).unwrap();

        let written: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let deployments = &written[DEPLOYMENTS_KEY];
        assert_eq!(deployments["token"], Value::String(format!("{:#x}", token)));
        assert_eq!(deployments["router"], Value::String(router.to_string()));
        assert_eq!(deployments.as_object().map(Map::len), Some(2));

        fs::remove_file(&path).unwrap();
    }
}
