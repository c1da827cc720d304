//! Deployment configuration, loaded once at start-up and passed explicitly to the orchestrator

use std::{fmt, path::PathBuf, str::FromStr};

use alloy::primitives::Address;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::{constants::DEFAULT_ARTIFACTS_DIR, errors::ScriptError};

/// The configuration keys a plan may reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConfigKey {
    /// The address of an already-deployed registry.
    ///
    /// Required by plans that target an existing registry.
    RegistryAddress,
    /// The DEX router. Optional, required by plans that register or look it up
    RouterAddress,
    /// The DEX factory. Optional, required by plans that register or look it up
    FactoryAddress,
    /// The multisig safe. Optional, required by plans that register or look it up
    SafeAddress,
}

impl ConfigKey {
    /// The environment variable from which the key is read
    pub fn env_var(&self) -> &'static str {
        match self {
            ConfigKey::RegistryAddress => "ADDRESS_BOOK",
            ConfigKey::RouterAddress => "ROUTER",
            ConfigKey::FactoryAddress => "FACTORY",
            ConfigKey::SafeAddress => "SAFE",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigKey::RegistryAddress => write!(f, "registryAddress"),
            ConfigKey::RouterAddress => write!(f, "routerAddress"),
            ConfigKey::FactoryAddress => write!(f, "factoryAddress"),
            ConfigKey::SafeAddress => write!(f, "safeAddress"),
        }
    }
}

/// Raw configuration inputs, as read from the command line or the environment
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Address of an already-deployed address book
    #[arg(long, env = "ADDRESS_BOOK")]
    pub address_book: Option<String>,

    /// Address of the DEX router
    #[arg(long, env = "ROUTER")]
    pub router: Option<String>,

    /// Address of the DEX factory
    #[arg(long, env = "FACTORY")]
    pub factory: Option<String>,

    /// Address of the multisig safe
    #[arg(long, env = "SAFE")]
    pub safe: Option<String>,

    /// Initial owner of the proxy admin contracts, defaults to the deployer
    #[arg(long, env = "PROXY_OWNER")]
    pub proxy_owner: Option<String>,

    /// Directory containing the compiled contract artifacts
    #[arg(long, env = "ARTIFACTS_DIR", default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts_dir: PathBuf,
}

/// The validated deployment configuration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployConfig {
    /// The address of an already-deployed registry
    pub registry_address: Option<Address>,
    /// The DEX router
    pub router_address: Option<Address>,
    /// The DEX factory
    pub factory_address: Option<Address>,
    /// The multisig safe
    pub safe_address: Option<Address>,
    /// The initial owner of proxy admin contracts, `None` means the deployer
    pub proxy_owner: Option<Address>,
    /// Directory containing the compiled contract artifacts
    pub artifacts_dir: PathBuf,
}

impl DeployConfig {
    /// Get the value of a configuration key, if set
    pub fn get(&self, key: ConfigKey) -> Option<Address> {
        match key {
            ConfigKey::RegistryAddress => self.registry_address,
            ConfigKey::RouterAddress => self.router_address,
            ConfigKey::FactoryAddress => self.factory_address,
            ConfigKey::SafeAddress => self.safe_address,
        }
    }

    /// Get the value of a configuration key, erroring if it is not set
    pub fn require(&self, key: ConfigKey) -> Result<Address, ScriptError> {
        self.get(key).ok_or_else(|| {
            ScriptError::Config(format!("`{}` is required but {} is not set", key, key.env_var()))
        })
    }
}

impl TryFrom<ConfigArgs> for DeployConfig {
    type Error = ScriptError;

    fn try_from(args: ConfigArgs) -> Result<Self, Self::Error> {
        Ok(DeployConfig {
            registry_address: parse_config_address(
                ConfigKey::RegistryAddress.env_var(),
                args.address_book.as_deref(),
            )?,
            router_address: parse_config_address(
                ConfigKey::RouterAddress.env_var(),
                args.router.as_deref(),
            )?,
            factory_address: parse_config_address(
                ConfigKey::FactoryAddress.env_var(),
                args.factory.as_deref(),
            )?,
            safe_address: parse_config_address(
                ConfigKey::SafeAddress.env_var(),
                args.safe.as_deref(),
            )?,
            proxy_owner: parse_config_address("PROXY_OWNER", args.proxy_owner.as_deref())?,
            artifacts_dir: args.artifacts_dir,
        })
    }
}

/// Parse an optional address input.
///
/// An absent input is `None`. An input that is present but empty, malformed,
/// or the zero address is a configuration error.
pub fn parse_config_address(
    name: &str,
    value: Option<&str>,
) -> Result<Option<Address>, ScriptError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let value = value.trim();
    if value.is_empty() {
        return Err(ScriptError::Config(format!("{} is set but empty", name)));
    }

    let address = Address::from_str(value)
        .map_err(|e| ScriptError::Config(format!("{} is not a valid address: {}", name, e)))?;
    if address.is_zero() {
        return Err(ScriptError::Config(format!("{} is the zero address", name)));
    }

    Ok(Some(address))
}
