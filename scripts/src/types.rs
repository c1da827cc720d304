//! Type definitions used throughout the scripts

use alloy::primitives::{Address, Bytes, U256};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    config::ConfigKey,
    constants::{DEFAULT_INITIALIZER, OUTPUT_KEY_SUFFIX},
};

/// A concrete value passed to a constructor, initializer, or contract call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum ArgValue {
    /// An `address`
    Address(Address),
    /// A `string`
    String(String),
    /// A `uint256`
    #[serde(rename = "uint256")]
    Uint(U256),
    /// A `bool`
    Bool(bool),
    /// Dynamic `bytes`
    Bytes(Bytes),
}

impl ArgValue {
    /// The Solidity type name of the value, as used in function signatures
    pub fn sol_type(&self) -> &'static str {
        match self {
            ArgValue::Address(_) => "address",
            ArgValue::String(_) => "string",
            ArgValue::Uint(_) => "uint256",
            ArgValue::Bool(_) => "bool",
            ArgValue::Bytes(_) => "bytes",
        }
    }
}

/// An argument as declared in a plan, before resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitArg {
    /// A literal value
    Literal(ArgValue),
    /// The address registered under the given name in the address book
    Lookup(String),
    /// The address held by a configuration key
    Config(ConfigKey),
}

impl InitArg {
    /// A literal address argument
    pub fn address(address: Address) -> Self {
        InitArg::Literal(ArgValue::Address(address))
    }

    /// A literal string argument
    pub fn string(value: impl Into<String>) -> Self {
        InitArg::Literal(ArgValue::String(value.into()))
    }

    /// A literal `uint256` argument
    pub fn uint(value: u64) -> Self {
        InitArg::Literal(ArgValue::Uint(U256::from(value)))
    }

    /// A registry lookup argument
    pub fn lookup(name: impl Into<String>) -> Self {
        InitArg::Lookup(name.into())
    }

    /// The registry name this argument reads, if any
    pub fn lookup_name(&self) -> Option<&str> {
        match self {
            InitArg::Lookup(name) => Some(name),
            _ => None,
        }
    }
}

/// How a module is instantiated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployKind {
    /// Behind a transparent upgradeable proxy, initialized once at proxy creation
    #[default]
    Proxy,
    /// Directly, with constructor arguments
    Plain,
}

/// Static metadata describing one deployable contract module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    /// The symbolic name the module is registered under
    pub name: String,
    /// The name of the compiled artifact to deploy
    pub factory: String,
    /// Whether the module is deployed behind a proxy
    #[serde(default)]
    pub kind: DeployKind,
    /// Initializer arguments for proxies, constructor arguments for plain modules
    #[serde(default)]
    pub args: Vec<InitArg>,
    /// The name of the initializer run at proxy creation
    #[serde(default = "default_initializer")]
    pub initializer: String,
    /// Whether `setAddressBook` is called after deployment
    #[serde(default = "default_true")]
    pub address_book_aware: bool,
    /// Registry names the contract reads on-chain during its setup
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Overrides the `NAME` emitted in bulk mode
    #[serde(default)]
    pub output_key: Option<String>,
}

fn default_initializer() -> String {
    DEFAULT_INITIALIZER.to_string()
}

fn default_true() -> bool {
    true
}

impl ModuleDescriptor {
    /// An upgradeable module with a parameterless initializer
    pub fn proxy(name: impl Into<String>, factory: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factory: factory.into(),
            kind: DeployKind::Proxy,
            args: Vec::new(),
            initializer: default_initializer(),
            address_book_aware: true,
            depends_on: Vec::new(),
            output_key: None,
        }
    }

    /// A plain module with no constructor arguments
    pub fn plain(name: impl Into<String>, factory: impl Into<String>) -> Self {
        Self { kind: DeployKind::Plain, ..Self::proxy(name, factory) }
    }

    /// Set the initializer/constructor arguments
    pub fn with_args(mut self, args: Vec<InitArg>) -> Self {
        self.args = args;
        self
    }

    /// Declare registry entries the contract reads on-chain during setup
    pub fn depends_on(mut self, names: &[&str]) -> Self {
        self.depends_on = names.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Override the emitted output key
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.output_key = Some(key.into());
        self
    }

    /// Skip the `setAddressBook` call
    pub fn without_address_book(mut self) -> Self {
        self.address_book_aware = false;
        self
    }

    /// All registry names that must be registered before this module is deployed
    pub fn dependencies(&self) -> Vec<&str> {
        self.args
            .iter()
            .filter_map(InitArg::lookup_name)
            .chain(self.depends_on.iter().map(String::as_str))
            .unique()
            .collect()
    }

    /// The `NAME` this module's address is emitted under
    pub fn output_key(&self) -> String {
        self.output_key
            .clone()
            .unwrap_or_else(|| format!("{}{}", self.name.to_uppercase(), OUTPUT_KEY_SUFFIX))
    }
}

/// A resolved function invocation: name plus concrete arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// The function name
    pub function: String,
    /// The resolved arguments
    pub args: Vec<ArgValue>,
}

impl Invocation {
    /// Create a new invocation
    pub fn new(function: impl Into<String>, args: Vec<ArgValue>) -> Self {
        Self { function: function.into(), args }
    }

    /// The canonical Solidity signature, e.g. `mintTo(address,uint256)`
    pub fn signature(&self) -> String {
        format!("{}({})", self.function, self.args.iter().map(ArgValue::sol_type).join(","))
    }
}

/// The addresses produced by a proxy deployment or upgrade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProxyDeployment {
    /// The proxy, which is the module's stable address
    pub proxy: Address,
    /// The logic contract the proxy forwards to
    pub implementation: Address,
    /// The admin contract entitled to upgrade the proxy
    pub admin: Address,
}

/// The (name -> address) pairs produced during a single run, in deployment order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentRecord {
    /// The recorded entries
    entries: Vec<(String, Address)>,
}

impl DeploymentRecord {
    /// Record an address, replacing any earlier address recorded under the same name
    pub fn insert(&mut self, name: &str, address: Address) {
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = address,
            None => self.entries.push((name.to_string(), address)),
        }
    }

    /// The address recorded under the given name
    pub fn get(&self, name: &str) -> Option<Address> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, a)| *a)
    }

    /// Iterate over the recorded entries in deployment order
    pub fn iter(&self) -> impl Iterator<Item = (&str, Address)> {
        self.entries.iter().map(|(n, a)| (n.as_str(), *a))
    }

    /// The number of recorded entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn signature_lists_argument_types() {
        let call = Invocation::new(
            "mintTo",
            vec![ArgValue::Address(Address::ZERO), ArgValue::Uint(U256::from(1))],
        );
        assert_eq!(call.signature(), "mintTo(address,uint256)");
        assert_eq!(Invocation::new("initialize", vec![]).signature(), "initialize()");
    }

    #[test]
    fn output_key_defaults_to_uppercased_name() {
        assert_eq!(
            ModuleDescriptor::proxy("addLiquidity", "AddLiquidity").output_key(),
            "ADDLIQUIDITY_ADDRESS"
        );
        assert_eq!(
            ModuleDescriptor::proxy("furbettoken", "FurBetToken")
                .with_output_key("FURBTOKEN_ADDRESS")
                .output_key(),
            "FURBTOKEN_ADDRESS"
        );
    }

    #[test]
    fn dependencies_merge_lookups_and_declared_reads() {
        let module = ModuleDescriptor::proxy("lpStaking", "LPStakingV1")
            .with_args(vec![
                InitArg::lookup("token"),
                InitArg::string("LP"),
                InitArg::lookup("payment"),
            ])
            .depends_on(&["token", "router"]);
        assert_eq!(module.dependencies(), vec!["token", "payment", "router"]);
    }

    #[test]
    fn record_keeps_latest_write() {
        let first = address!("0x0000000000000000000000000000000000000001");
        let second = address!("0x0000000000000000000000000000000000000002");

        let mut record = DeploymentRecord::default();
        record.insert("token", first);
        record.insert("pool", second);
        record.insert("token", second);

        assert_eq!(record.len(), 2);
        assert_eq!(record.get("token"), Some(second));
        assert_eq!(record.iter().map(|(n, _)| n).collect::<Vec<_>>(), vec!["token", "pool"]);
    }

    #[test]
    fn module_descriptor_defaults_from_json() {
        let module: ModuleDescriptor =
            serde_json::from_str(r#"{ "name": "swap", "factory": "Swap" }"#).unwrap();
        assert_eq!(module, ModuleDescriptor::proxy("swap", "Swap"));
    }
}
