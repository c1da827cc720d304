//! Deployment plans: the ordered steps of a run, their validation, and the built-in plans

use std::{collections::HashMap, fs, path::Path};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::{
    config::{ConfigKey, DeployConfig},
    constants::{
        ADDRESS_BOOK_ARTIFACT, ADD_LIQUIDITY_KEY, AUTOCOMPOUND_KEY, FACTORY_KEY, PAYMENT_KEY,
        POOL_KEY, ROUTER_KEY, SAFE_KEY, TOKEN_KEY,
    },
    errors::ScriptError,
    types::{ArgValue, DeployKind, InitArg, ModuleDescriptor},
};

/// Where the address book used by a plan comes from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrySource {
    /// The already-deployed address book given by `registryAddress`
    #[default]
    Existing,
    /// A fresh address book deployed at the start of the run
    Deploy {
        /// The artifact of the address book contract
        factory: String,
        /// How the address book is instantiated
        #[serde(default)]
        kind: DeployKind,
    },
}

/// How deployed addresses are reported to the operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Machine-parseable `NAME=address` lines on stdout
    #[default]
    Bulk,
    /// One `<Factory> proxy deployed to: <address>` line per module
    Human,
}

/// A single step of a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Deploy a module and register it under its name
    Module(ModuleDescriptor),
    /// Register an address that is not deployed by this run
    Register {
        /// The registry name
        name: String,
        /// The address to register
        value: InitArg,
    },
    /// Invoke a function on an already-registered module
    Call {
        /// The registry name of the module to call
        target: String,
        /// The function name
        function: String,
        /// The call arguments
        #[serde(default)]
        args: Vec<InitArg>,
    },
}

impl Step {
    /// The registry name this step writes, if any
    pub fn produces(&self) -> Option<&str> {
        match self {
            Step::Module(module) => Some(&module.name),
            Step::Register { name, .. } => Some(name),
            Step::Call { .. } => None,
        }
    }

    /// The registry names that must be registered before this step runs
    pub fn dependencies(&self) -> Vec<&str> {
        match self {
            Step::Module(module) => module.dependencies(),
            Step::Register { value, .. } => value.lookup_name().into_iter().collect(),
            Step::Call { target, args, .. } => std::iter::once(target.as_str())
                .chain(args.iter().filter_map(InitArg::lookup_name))
                .collect(),
        }
    }

    /// The arguments the step resolves before sending anything
    pub fn args(&self) -> impl Iterator<Item = &InitArg> {
        let args: &[InitArg] = match self {
            Step::Module(module) => &module.args,
            Step::Register { value, .. } => std::slice::from_ref(value),
            Step::Call { args, .. } => args,
        };
        args.iter()
    }

    /// A short description of the step for logs and errors
    pub fn describe(&self) -> String {
        match self {
            Step::Module(module) => format!("module `{}`", module.name),
            Step::Register { name, .. } => format!("registration of `{}`", name),
            Step::Call { target, function, .. } => format!("call `{}.{}`", target, function),
        }
    }
}

/// An ordered deployment plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    /// The address book the plan writes into
    #[serde(default)]
    pub registry: RegistrySource,
    /// How deployed addresses are reported
    #[serde(default)]
    pub output: OutputMode,
    /// The steps, executed strictly in order
    pub steps: Vec<Step>,
}

impl Plan {
    /// Read a plan from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ScriptError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ScriptError::InvalidPlan(format!("could not read {}: {}", path.display(), e))
        })?;

        serde_json::from_str(&contents).map_err(|e| {
            ScriptError::InvalidPlan(format!("could not parse {}: {}", path.display(), e))
        })
    }

    /// Check that every dependency is registered by an earlier step, or, for
    /// plans targeting an existing address book, is left to be found there.
    ///
    /// A dependency registered by the same or a later step is always rejected.
    pub fn validate(&self) -> Result<(), ScriptError> {
        let mut first_producer: HashMap<&str, usize> = HashMap::new();
        for (idx, step) in self.steps.iter().enumerate() {
            if let Step::Module(module) = step {
                if module.name.is_empty() || module.factory.is_empty() {
                    return Err(ScriptError::InvalidPlan(format!(
                        "step {} has an empty module name or factory",
                        idx
                    )));
                }
            }

            if step.args().any(is_zero_address) {
                return Err(ScriptError::InvalidPlan(format!(
                    "{} (step {}) passes the zero address",
                    step.describe(),
                    idx
                )));
            }

            if let Some(name) = step.produces() {
                first_producer.entry(name).or_insert(idx);
            }
        }

        for (idx, step) in self.steps.iter().enumerate() {
            for dep in step.dependencies() {
                match first_producer.get(dep) {
                    Some(&producer) if producer < idx => {}
                    Some(&producer) => {
                        return Err(ScriptError::InvalidPlan(format!(
                            "{} (step {}) depends on `{}`, which is only registered at step {}",
                            step.describe(),
                            idx,
                            dep,
                            producer
                        )))
                    }
                    None if matches!(self.registry, RegistrySource::Deploy { .. }) => {
                        return Err(ScriptError::InvalidPlan(format!(
                            "{} (step {}) depends on `{}`, which is never registered in the \
                             fresh address book",
                            step.describe(),
                            idx,
                            dep
                        )))
                    }
                    None => {}
                }
            }
        }

        Ok(())
    }

    /// The configuration keys the plan's arguments read
    pub fn config_keys(&self) -> Vec<ConfigKey> {
        let mut keys = Vec::new();
        for arg in self.steps.iter().flat_map(Step::args) {
            if let InitArg::Config(key) = arg {
                if !keys.contains(key) {
                    keys.push(*key);
                }
            }
        }

        keys
    }

    /// Check everything about the plan that can be checked without a chain:
    /// its structure, the configuration keys it reads, and the address book
    /// it targets
    pub fn preflight(&self, config: &DeployConfig) -> Result<(), ScriptError> {
        self.validate()?;
        for key in self.config_keys() {
            config.require(key)?;
        }
        if self.registry == RegistrySource::Existing {
            config.require(ConfigKey::RegistryAddress)?;
        }

        Ok(())
    }

    /// The names this plan expects to already be present in the address book
    pub fn external_requirements(&self) -> Vec<&str> {
        let mut produced = Vec::new();
        let mut external = Vec::new();
        for step in &self.steps {
            for dep in step.dependencies() {
                if !produced.contains(&dep) && !external.contains(&dep) {
                    external.push(dep);
                }
            }
            if let Some(name) = step.produces() {
                produced.push(name);
            }
        }

        external
    }
}

/// Whether the argument is a literal zero address
fn is_zero_address(arg: &InitArg) -> bool {
    matches!(arg, InitArg::Literal(ArgValue::Address(address)) if address.is_zero())
}

// ------------------
// | Built-in Plans |
// ------------------

/// The plans shipped with the scripts
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinPlan {
    /// Deploy a fresh address book and the complete module set
    Testnet,
    /// Deploy the token and the pool into an existing address book
    TokenPool,
    /// Deploy the add-liquidity module into an existing address book
    AddLiquidity,
    /// Deploy the auto-compound module into an existing address book
    AutoCompound,
}

impl BuiltinPlan {
    /// Build the plan
    pub fn plan(self) -> Plan {
        match self {
            BuiltinPlan::Testnet => testnet_plan(),
            BuiltinPlan::TokenPool => Plan {
                registry: RegistrySource::Existing,
                output: OutputMode::Human,
                steps: vec![
                    Step::Module(ModuleDescriptor::proxy(TOKEN_KEY, "Token")),
                    Step::Module(
                        ModuleDescriptor::proxy(POOL_KEY, "Pool").depends_on(&[TOKEN_KEY]),
                    ),
                ],
            },
            BuiltinPlan::AddLiquidity => Plan {
                registry: RegistrySource::Existing,
                output: OutputMode::Human,
                steps: vec![Step::Module(add_liquidity())],
            },
            BuiltinPlan::AutoCompound => Plan {
                registry: RegistrySource::Existing,
                output: OutputMode::Human,
                steps: vec![Step::Module(ModuleDescriptor::proxy(
                    AUTOCOMPOUND_KEY,
                    "AutoCompoundV2",
                ))],
            },
        }
    }
}

/// The add-liquidity module, which swaps through the registered router
fn add_liquidity() -> ModuleDescriptor {
    ModuleDescriptor::proxy(ADD_LIQUIDITY_KEY, "AddLiquidity").depends_on(&[ROUTER_KEY])
}

/// Register the address held by a configuration key
fn register_from_config(name: &str, key: ConfigKey) -> Step {
    Step::Register { name: name.to_string(), value: InitArg::Config(key) }
}

/// A fresh address book seeded with the external DEX and safe addresses,
/// followed by every module of the system
fn testnet_plan() -> Plan {
    let steps = vec![
        register_from_config(FACTORY_KEY, ConfigKey::FactoryAddress),
        register_from_config(ROUTER_KEY, ConfigKey::RouterAddress),
        register_from_config(SAFE_KEY, ConfigKey::SafeAddress),
        Step::Module(ModuleDescriptor::proxy(TOKEN_KEY, "TokenV1")),
        Step::Module(
            ModuleDescriptor::proxy(PAYMENT_KEY, "FakeToken")
                .with_args(vec![InitArg::string("USD Coin"), InitArg::string("USDC")]),
        ),
        Step::Module(
            ModuleDescriptor::proxy(POOL_KEY, "Pool").depends_on(&[TOKEN_KEY, PAYMENT_KEY]),
        ),
        // Seed the pool with payment currency before it creates its liquidity
        Step::Call {
            target: PAYMENT_KEY.to_string(),
            function: "mintTo".to_string(),
            args: vec![InitArg::lookup(POOL_KEY), InitArg::uint(1_000_000)],
        },
        Step::Call {
            target: POOL_KEY.to_string(),
            function: "createLiquidity".to_string(),
            args: vec![],
        },
        Step::Module(ModuleDescriptor::proxy("swap", "Swap")),
        Step::Module(ModuleDescriptor::proxy("vault", "Vault")),
        Step::Module(ModuleDescriptor::proxy("downline", "Downline")),
        Step::Module(ModuleDescriptor::proxy(AUTOCOMPOUND_KEY, "AutoCompoundV2")),
        Step::Module(
            ModuleDescriptor::proxy("furbettoken", "FurBetToken")
                .with_output_key("FURBTOKEN_ADDRESS"),
        ),
        Step::Module(
            ModuleDescriptor::proxy("furbetpresale", "FurBetPresale")
                .with_output_key("FURBPRESALE_ADDRESS"),
        ),
        Step::Module(
            ModuleDescriptor::proxy("furbetstake", "FurBetStake")
                .with_output_key("FURBSTAKE_ADDRESS"),
        ),
        Step::Module(add_liquidity()),
        Step::Module(ModuleDescriptor::proxy("lpStaking", "LPStakingV1")),
    ];

    Plan {
        registry: RegistrySource::Deploy {
            factory: ADDRESS_BOOK_ARTIFACT.to_string(),
            kind: DeployKind::Proxy,
        },
        output: OutputMode::Bulk,
        steps,
    }
}
