//! The deployment orchestrator: executes a plan step by step, wiring every
//! deployed module into the address book.
//!
//! Steps run strictly in order and each one waits for its transactions to be
//! confirmed. The first failure aborts the run; entries registered before it
//! are left in place.

use alloy::primitives::Address;
use tracing::{info, warn};

use crate::{
    chain::Chain,
    config::{ConfigKey, DeployConfig},
    constants::{ADDRESS_BOOK_OUTPUT_KEY, DEFAULT_INITIALIZER},
    errors::ScriptError,
    plan::{OutputMode, Plan, RegistrySource, Step},
    types::{
        ArgValue, DeployKind, DeploymentRecord, InitArg, Invocation, ModuleDescriptor,
        ProxyDeployment,
    },
};

/// The name under which a freshly deployed address book is recorded
pub const ADDRESS_BOOK_RECORD_NAME: &str = "addressBook";

/// Runs deployment plans against a chain
pub struct Orchestrator<'a, C> {
    /// The chain client
    chain: &'a C,
    /// The configuration loaded at start-up
    config: &'a DeployConfig,
}

impl<'a, C: Chain> Orchestrator<'a, C> {
    /// Create an orchestrator over the given chain and configuration
    pub fn new(chain: &'a C, config: &'a DeployConfig) -> Self {
        Self { chain, config }
    }

    /// Execute a plan, returning the addresses it deployed
    pub async fn run(&self, plan: &Plan) -> Result<DeploymentRecord, ScriptError> {
        plan.preflight(self.config)?;

        let mut record = DeploymentRecord::default();
        let registry = match &plan.registry {
            RegistrySource::Existing => {
                let registry = self.existing_registry()?;
                // Entries the plan reads but never writes must already be registered
                for name in plan.external_requirements() {
                    self.lookup(registry, name).await?;
                }
                registry
            }
            RegistrySource::Deploy { factory, kind } => {
                let registry = self.deploy_registry(factory, *kind).await?;
                emit(plan.output, ADDRESS_BOOK_OUTPUT_KEY, factory, *kind, registry);
                record.insert(ADDRESS_BOOK_RECORD_NAME, registry);
                registry
            }
        };
        info!(%registry, steps = plan.steps.len(), "running deployment plan");

        for step in &plan.steps {
            match step {
                Step::Module(module) => {
                    let address = self.deploy_module(registry, module).await?;
                    emit(plan.output, &module.output_key(), &module.factory, module.kind, address);
                    record.insert(&module.name, address);
                }
                Step::Register { name, value } => {
                    let address = self.resolve_address(registry, value).await?;
                    self.chain.registry_set(registry, name, address).await?;
                    info!(name = name.as_str(), %address, "registered external address");
                }
                Step::Call { target, function, args } => {
                    let target_address = self.lookup(registry, target).await?;
                    let args = self.resolve_args(registry, args).await?;
                    let call = Invocation::new(function.as_str(), args);
                    self.chain.invoke(target_address, &call).await?;
                    info!(module = target.as_str(), call = %call.signature(), "called module");
                }
            }
        }

        Ok(record)
    }

    /// Deploy a single module and register it, returning its address
    pub async fn deploy_module(
        &self,
        registry: Address,
        module: &ModuleDescriptor,
    ) -> Result<Address, ScriptError> {
        // Resolve everything before the first transaction is sent
        let args = self.resolve_args(registry, &module.args).await?;
        for dep in &module.depends_on {
            self.lookup(registry, dep).await?;
        }

        let address = match module.kind {
            DeployKind::Proxy => {
                let initializer = Invocation::new(module.initializer.as_str(), args);
                let ProxyDeployment { proxy, implementation, admin } = self
                    .chain
                    .deploy_proxy(&module.factory, self.proxy_owner(), &initializer)
                    .await?;
                info!(
                    module = module.name.as_str(),
                    %proxy, %implementation, %admin,
                    "proxy deployed"
                );
                proxy
            }
            DeployKind::Plain => {
                let address = self.chain.deploy(&module.factory, &args).await?;
                info!(module = module.name.as_str(), %address, "contract deployed");
                address
            }
        };

        if module.address_book_aware {
            self.chain.set_address_book(address, registry).await?;
        }
        self.chain.registry_set(registry, &module.name, address).await?;

        Ok(address)
    }

    /// Upgrade the proxy registered under `name` to a fresh deployment of `factory`,
    /// optionally invoking `function(args)` through the proxy.
    ///
    /// The registry entry is left untouched.
    pub async fn upgrade(
        &self,
        registry: Address,
        name: &str,
        factory: &str,
        function: Option<&str>,
        args: &[InitArg],
    ) -> Result<ProxyDeployment, ScriptError> {
        let proxy = self.lookup(registry, name).await?;
        let call = match function {
            Some(function) => {
                Some(Invocation::new(function, self.resolve_args(registry, args).await?))
            }
            None => None,
        };

        let deployment = self.chain.upgrade_proxy(proxy, factory, call.as_ref()).await?;
        info!(
            name,
            proxy = %deployment.proxy,
            implementation = %deployment.implementation,
            "proxy upgraded"
        );

        Ok(deployment)
    }

    /// Read the address registered under `name`, failing if nothing is registered
    pub async fn lookup(&self, registry: Address, name: &str) -> Result<Address, ScriptError> {
        let address = self.chain.registry_get(registry, name).await?;
        if address.is_zero() {
            return Err(ScriptError::MissingRegistryEntry(name.to_string()));
        }

        Ok(address)
    }

    /// Register `address` under `name`
    pub async fn register(
        &self,
        registry: Address,
        name: &str,
        address: Address,
    ) -> Result<(), ScriptError> {
        if address.is_zero() {
            return Err(ScriptError::Config(format!(
                "refusing to register `{}` as the zero address",
                name
            )));
        }

        let previous = self.chain.registry_get(registry, name).await?;
        if !previous.is_zero() && previous != address {
            warn!(name, %previous, %address, "overwriting registry entry");
        }

        self.chain.registry_set(registry, name, address).await
    }

    /// The registry targeted by plans that do not deploy their own
    pub fn existing_registry(&self) -> Result<Address, ScriptError> {
        self.config.require(ConfigKey::RegistryAddress)
    }

    // -----------
    // | Helpers |
    // -----------

    /// Deploy a fresh address book
    async fn deploy_registry(
        &self,
        factory: &str,
        kind: DeployKind,
    ) -> Result<Address, ScriptError> {
        let registry = match kind {
            DeployKind::Proxy => {
                let initializer = Invocation::new(DEFAULT_INITIALIZER, vec![]);
                self.chain.deploy_proxy(factory, self.proxy_owner(), &initializer).await?.proxy
            }
            DeployKind::Plain => self.chain.deploy(factory, &[]).await?,
        };
        info!(%registry, "address book deployed");

        Ok(registry)
    }

    /// The initial owner of proxy admin contracts
    fn proxy_owner(&self) -> Address {
        self.config.proxy_owner.unwrap_or_else(|| self.chain.deployer())
    }

    /// Resolve declared arguments into concrete values
    async fn resolve_args(
        &self,
        registry: Address,
        args: &[InitArg],
    ) -> Result<Vec<ArgValue>, ScriptError> {
        let mut resolved = Vec::with_capacity(args.len());
        for arg in args {
            let value = match arg {
                InitArg::Literal(value) => value.clone(),
                InitArg::Lookup(name) => ArgValue::Address(self.lookup(registry, name).await?),
                InitArg::Config(key) => ArgValue::Address(self.config.require(*key)?),
            };
            resolved.push(value);
        }

        Ok(resolved)
    }

    /// Resolve a declared argument that must be a non-zero address
    async fn resolve_address(
        &self,
        registry: Address,
        arg: &InitArg,
    ) -> Result<Address, ScriptError> {
        let resolved = self.resolve_args(registry, std::slice::from_ref(arg)).await?;
        match resolved.first() {
            Some(ArgValue::Address(address)) if !address.is_zero() => Ok(*address),
            Some(ArgValue::Address(_)) => {
                Err(ScriptError::InvalidPlan("cannot register the zero address".to_string()))
            }
            other => Err(ScriptError::InvalidPlan(format!(
                "registered values must be addresses, got {:?}",
                other
            ))),
        }
    }
}

/// Report a deployed address to the operator
fn emit(mode: OutputMode, output_key: &str, factory: &str, kind: DeployKind, address: Address) {
    println!("{}", format_output(mode, output_key, factory, kind, address));
}

/// Format a deployed address for the operator
pub fn format_output(
    mode: OutputMode,
    output_key: &str,
    factory: &str,
    kind: DeployKind,
    address: Address,
) -> String {
    match (mode, kind) {
        (OutputMode::Bulk, _) => format!("{}={}", output_key, address),
        (OutputMode::Human, DeployKind::Proxy) => {
            format!("{} proxy deployed to: {}", factory, address)
        }
        (OutputMode::Human, DeployKind::Plain) => format!("{} deployed to: {}", factory, address),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn bulk_output_is_name_equals_address() {
        let address = address!("0x00000000000000000000000000000000000000aa");
        assert_eq!(
            format_output(OutputMode::Bulk, "TOKEN_ADDRESS", "TokenV1", DeployKind::Proxy, address),
            format!("TOKEN_ADDRESS={}", address)
        );
        assert_eq!(
            format_output(
                OutputMode::Human,
                "TOKEN_ADDRESS",
                "TokenV1",
                DeployKind::Proxy,
                address
            ),
            format!("TokenV1 proxy deployed to: {}", address)
        );
        assert_eq!(
            format_output(
                OutputMode::Human,
                "PAYMENT_ADDRESS",
                "FakeToken",
                DeployKind::Plain,
                address
            ),
            format!("FakeToken deployed to: {}", address)
        );
    }
}
