//! An in-memory chain for exercising the orchestrator without a node

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard},
};

use alloy::primitives::Address;
use async_trait::async_trait;
use scripts::{
    chain::Chain,
    config::DeployConfig,
    constants::ADDRESS_BOOK_ARTIFACT,
    errors::ScriptError,
    types::{ArgValue, Invocation, ProxyDeployment},
};

/// The deployer account of the in-memory chain
pub const DEPLOYER: Address = Address::repeat_byte(0xde);

/// A contract living on the in-memory chain
#[derive(Debug, Clone, Default)]
pub struct Contract {
    /// The artifact the contract was deployed from
    pub factory: String,
    /// Constructor arguments, for plainly deployed contracts
    pub constructor_args: Vec<ArgValue>,
    /// The initializer run at proxy creation, for proxies
    pub initializer: Option<Invocation>,
    /// The implementation, for proxies
    pub implementation: Option<Address>,
    /// The address book handed to the contract
    pub address_book: Option<Address>,
    /// Calls made to the contract after deployment
    pub calls: Vec<Invocation>,
    /// Registry entries, for address books
    pub entries: HashMap<String, Address>,
}

/// A failure to inject into the in-memory chain
#[derive(Debug, Clone)]
pub enum Fault {
    /// Deploying the given artifact fails at submission
    Deploy(String),
    /// Registering the given name reverts
    Register(String),
}

#[derive(Default)]
struct State {
    /// The nonce used to derive the next contract address
    nonce: u64,
    /// Deployed contracts by address
    contracts: HashMap<Address, Contract>,
    /// The number of state-changing transactions sent
    transactions: usize,
    /// Injected failures
    faults: Vec<Fault>,
}

/// A chain that executes deployments and registry writes in memory
#[derive(Default)]
pub struct InMemoryChain {
    state: Mutex<State>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject a failure
    pub fn inject(&self, fault: Fault) {
        self.state().faults.push(fault);
    }

    /// Deploy an address book outside of any plan
    pub fn deploy_registry(&self) -> Address {
        let mut state = self.state();
        let registry =
            Contract { factory: ADDRESS_BOOK_ARTIFACT.to_string(), ..Default::default() };
        create(&mut state, registry)
    }

    /// The number of state-changing transactions sent so far
    pub fn transactions(&self) -> usize {
        self.state().transactions
    }

    /// A snapshot of the contract at the given address
    pub fn contract(&self, address: Address) -> Option<Contract> {
        self.state().contracts.get(&address).cloned()
    }

    /// A snapshot of the entries of the given address book
    pub fn entries(&self, registry: Address) -> HashMap<String, Address> {
        self.contract(registry).map(|c| c.entries).unwrap_or_default()
    }

    /// Every address a contract was deployed at
    pub fn deployed_addresses(&self) -> Vec<Address> {
        self.state().contracts.keys().copied().collect()
    }

    /// The number of deployed contracts created from the given artifact
    pub fn count_deployed(&self, factory: &str) -> usize {
        self.state().contracts.values().filter(|c| c.factory == factory).count()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }
}

/// Create a contract at a fresh address, counting the transaction
fn create(state: &mut State, contract: Contract) -> Address {
    state.nonce += 1;
    state.transactions += 1;

    let mut bytes = [0u8; 20];
    bytes[12..].copy_from_slice(&state.nonce.to_be_bytes());
    let address = Address::from(bytes);
    state.contracts.insert(address, contract);

    address
}

/// Fail if deploying the given artifact was set up to fail
fn check_deploy(state: &State, factory: &str) -> Result<(), ScriptError> {
    let faulty = state.faults.iter().any(|f| matches!(f, Fault::Deploy(name) if name == factory));
    if faulty {
        return Err(ScriptError::Submission(format!("deploy {}: insufficient funds", factory)));
    }

    Ok(())
}

#[async_trait]
impl Chain for InMemoryChain {
    fn deployer(&self) -> Address {
        DEPLOYER
    }

    async fn deploy(
        &self,
        factory: &str,
        constructor_args: &[ArgValue],
    ) -> Result<Address, ScriptError> {
        let mut state = self.state();
        check_deploy(&state, factory)?;

        Ok(create(
            &mut state,
            Contract {
                factory: factory.to_string(),
                constructor_args: constructor_args.to_vec(),
                ..Default::default()
            },
        ))
    }

    async fn deploy_proxy(
        &self,
        factory: &str,
        _owner: Address,
        initializer: &Invocation,
    ) -> Result<ProxyDeployment, ScriptError> {
        let mut state = self.state();
        check_deploy(&state, factory)?;

        let implementation =
            create(&mut state, Contract { factory: factory.to_string(), ..Default::default() });
        let admin = Contract { factory: "ProxyAdmin".to_string(), ..Default::default() };
        let admin = create(&mut state, admin);
        let proxy = create(
            &mut state,
            Contract {
                factory: factory.to_string(),
                initializer: Some(initializer.clone()),
                implementation: Some(implementation),
                ..Default::default()
            },
        );
        // The proxy and its admin come out of a single transaction
        state.transactions -= 1;

        Ok(ProxyDeployment { proxy, implementation, admin })
    }

    async fn upgrade_proxy(
        &self,
        proxy: Address,
        factory: &str,
        call: Option<&Invocation>,
    ) -> Result<ProxyDeployment, ScriptError> {
        let mut state = self.state();
        check_deploy(&state, factory)?;
        if state.contracts.get(&proxy).and_then(|c| c.implementation).is_none() {
            return Err(ScriptError::ContractInteraction(format!("{} is not a proxy", proxy)));
        }

        let implementation =
            create(&mut state, Contract { factory: factory.to_string(), ..Default::default() });
        state.transactions += 1;

        let contract = state.contracts.get_mut(&proxy).expect("proxy checked above");
        contract.implementation = Some(implementation);
        contract.factory = factory.to_string();
        if let Some(call) = call {
            contract.calls.push(call.clone());
        }

        Ok(ProxyDeployment { proxy, implementation, admin: Address::ZERO })
    }

    async fn invoke(&self, target: Address, call: &Invocation) -> Result<(), ScriptError> {
        let mut state = self.state();
        state.transactions += 1;
        let contract = state
            .contracts
            .get_mut(&target)
            .ok_or_else(|| ScriptError::Reverted(format!("{} has no code", target)))?;
        contract.calls.push(call.clone());

        Ok(())
    }

    async fn set_address_book(
        &self,
        module: Address,
        registry: Address,
    ) -> Result<(), ScriptError> {
        let mut state = self.state();
        state.transactions += 1;
        let contract = state
            .contracts
            .get_mut(&module)
            .ok_or_else(|| ScriptError::Reverted(format!("{} has no code", module)))?;
        contract.address_book = Some(registry);

        Ok(())
    }

    async fn registry_get(&self, registry: Address, name: &str) -> Result<Address, ScriptError> {
        let state = self.state();
        let contract = state
            .contracts
            .get(&registry)
            .filter(|c| c.factory == ADDRESS_BOOK_ARTIFACT)
            .ok_or_else(|| {
                ScriptError::ContractInteraction(format!("{} is not an address book", registry))
            })?;

        Ok(contract.entries.get(name).copied().unwrap_or(Address::ZERO))
    }

    async fn registry_set(
        &self,
        registry: Address,
        name: &str,
        address: Address,
    ) -> Result<(), ScriptError> {
        let mut state = self.state();
        state.transactions += 1;

        let reverts = state.faults.iter().any(|f| matches!(f, Fault::Register(n) if n == name));
        if reverts {
            return Err(ScriptError::Reverted(format!(
                "set({}, {}): caller is not the owner",
                name, address
            )));
        }

        let contract = state
            .contracts
            .get_mut(&registry)
            .filter(|c| c.factory == ADDRESS_BOOK_ARTIFACT)
            .ok_or_else(|| ScriptError::Reverted(format!("{} is not an address book", registry)))?;
        contract.entries.insert(name.to_string(), address);

        Ok(())
    }
}

/// A configuration targeting the given existing address book
pub fn config_for(registry: Address) -> DeployConfig {
    DeployConfig { registry_address: Some(registry), ..Default::default() }
}
