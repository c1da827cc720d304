//! The chain-client seam through which the orchestrator reaches the network.
//!
//! Every state-changing method returns only once its transaction is confirmed.

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::{
    errors::ScriptError,
    types::{ArgValue, Invocation, ProxyDeployment},
};

/// A contract factory and transaction sender for a single deployer account
#[async_trait]
pub trait Chain: Send + Sync {
    /// The account transactions are sent from
    fn deployer(&self) -> Address;

    /// Deploy the named contract directly with the given constructor arguments
    async fn deploy(&self, factory: &str, constructor_args: &[ArgValue])
        -> Result<Address, ScriptError>;

    /// Deploy the named contract as the implementation behind a fresh proxy owned
    /// by `owner`, running `initializer` exactly once at proxy creation
    async fn deploy_proxy(
        &self,
        factory: &str,
        owner: Address,
        initializer: &Invocation,
    ) -> Result<ProxyDeployment, ScriptError>;

    /// Deploy the named contract and point the given proxy at it, optionally
    /// invoking `call` on the new implementation through the proxy
    async fn upgrade_proxy(
        &self,
        proxy: Address,
        factory: &str,
        call: Option<&Invocation>,
    ) -> Result<ProxyDeployment, ScriptError>;

    /// Invoke a state-changing function on a deployed contract
    async fn invoke(&self, target: Address, call: &Invocation) -> Result<(), ScriptError>;

    /// Call `setAddressBook(registry)` on a deployed module
    async fn set_address_book(&self, module: Address, registry: Address)
        -> Result<(), ScriptError>;

    /// Read the address registered under `name`, the zero address if unset
    async fn registry_get(&self, registry: Address, name: &str) -> Result<Address, ScriptError>;

    /// Register `address` under `name`, overwriting any previous entry
    async fn registry_set(
        &self,
        registry: Address,
        name: &str,
        address: Address,
    ) -> Result<(), ScriptError>;
}
