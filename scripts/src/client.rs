//! The alloy-backed implementation of the chain seam

use std::str::FromStr;

use alloy::{
    contract::Error as ContractError,
    network::{Ethereum, TransactionBuilder},
    primitives::{Address, Bytes, B256, U256},
    providers::{DynProvider, PendingTransactionBuilder, Provider, ProviderBuilder},
    rpc::types::{TransactionReceipt, TransactionRequest},
    signers::local::PrivateKeySigner,
    transports::{http::reqwest::Url, TransportError},
};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    artifacts::ArtifactStore,
    chain::Chain,
    constants::{NUM_CONFIRMATIONS, PROXY_ADMIN_STORAGE_SLOT, PROXY_ARTIFACT},
    errors::ScriptError,
    solidity::{AddressBook, AddressBookAware, ProxyAdmin},
    types::{ArgValue, Invocation, ProxyDeployment},
    utils::{creation_code, encode_call},
};

/// A chain client sending signed transactions over HTTP
pub struct AlloyChain {
    /// The signing provider
    provider: DynProvider<Ethereum>,
    /// The address of the signer
    deployer: Address,
    /// Where compiled artifacts are read from
    artifacts: ArtifactStore,
}

/// Sets up the signing client, reading the chain ID to check the RPC endpoint is reachable
pub async fn setup_client(
    priv_key: &str,
    rpc_url: &str,
    artifacts: ArtifactStore,
) -> Result<AlloyChain, ScriptError> {
    let signer = PrivateKeySigner::from_str(priv_key)
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let url = Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let deployer = signer.address();

    let provider = ProviderBuilder::new().wallet(signer).connect_http(url);
    let provider = DynProvider::new(provider);

    let chain_id = provider
        .get_chain_id()
        .await
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    info!(chain_id, %deployer, "connected to chain");

    Ok(AlloyChain { provider, deployer, artifacts })
}

impl AlloyChain {
    /// Submit a transaction and wait for it to be confirmed
    async fn send_tx(
        &self,
        tx: TransactionRequest,
        what: &str,
    ) -> Result<TransactionReceipt, ScriptError> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| transport_error(what, e))?;

        confirm(pending, what).await
    }

    /// Deploy creation code, returning the address of the new contract
    async fn deploy_code(&self, code: Bytes, what: &str) -> Result<Address, ScriptError> {
        let tx = TransactionRequest::default().with_deploy_code(code);
        let receipt = self.send_tx(tx, what).await?;

        receipt.contract_address.ok_or_else(|| {
            ScriptError::Submission(format!("{}: receipt carries no contract address", what))
        })
    }

    /// Read the proxy admin contract address from its EIP-1967 storage slot.
    ///
    /// This is the recommended way to get the proxy admin address:
    /// https://github.com/OpenZeppelin/openzeppelin-contracts/blob/v5.0.0/contracts/proxy/ERC1967/ERC1967Utils.sol#L104-L106
    async fn proxy_admin(&self, proxy: Address) -> Result<Address, ScriptError> {
        let slot = U256::from_str(PROXY_ADMIN_STORAGE_SLOT)
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;
        let value = self
            .provider
            .get_storage_at(proxy, slot)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))?;

        Ok(Address::from_word(B256::from(value.to_be_bytes::<32>())))
    }
}

#[async_trait]
impl Chain for AlloyChain {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn deploy(
        &self,
        factory: &str,
        constructor_args: &[ArgValue],
    ) -> Result<Address, ScriptError> {
        let bytecode = self.artifacts.bytecode(factory)?;
        let address = self
            .deploy_code(creation_code(&bytecode, constructor_args), &format!("deploy {}", factory))
            .await?;
        debug!(factory, %address, "contract deployed");

        Ok(address)
    }

    async fn deploy_proxy(
        &self,
        factory: &str,
        owner: Address,
        initializer: &Invocation,
    ) -> Result<ProxyDeployment, ScriptError> {
        // Encode first so a malformed initializer fails before anything is sent
        let data = encode_call(initializer)?;
        let proxy_bytecode = self.artifacts.bytecode(PROXY_ARTIFACT)?;

        let implementation = self.deploy(factory, &[]).await?;

        // Concretely, this is a `TransparentUpgradeableProxy`, which itself deploys a `ProxyAdmin`
        // owned by `owner`
        let proxy_args =
            [ArgValue::Address(implementation), ArgValue::Address(owner), ArgValue::Bytes(data)];
        let proxy = self
            .deploy_code(
                creation_code(&proxy_bytecode, &proxy_args),
                &format!("deploy {} proxy", factory),
            )
            .await?;

        let admin = self.proxy_admin(proxy).await?;
        debug!(factory, %proxy, %implementation, %admin, "proxy deployed");

        Ok(ProxyDeployment { proxy, implementation, admin })
    }

    async fn upgrade_proxy(
        &self,
        proxy: Address,
        factory: &str,
        call: Option<&Invocation>,
    ) -> Result<ProxyDeployment, ScriptError> {
        let data = call.map(encode_call).transpose()?.unwrap_or_default();

        let admin = self.proxy_admin(proxy).await?;
        if admin.is_zero() {
            return Err(ScriptError::ContractInteraction(format!(
                "{} is not a transparent upgradeable proxy",
                proxy
            )));
        }

        let implementation = self.deploy(factory, &[]).await?;

        let what = format!("upgrade {} to {}", proxy, factory);
        let proxy_admin = ProxyAdmin::new(admin, &self.provider);
        let pending = proxy_admin
            .upgradeAndCall(proxy, implementation, data)
            .send()
            .await
            .map_err(|e| contract_error(&what, e))?;
        confirm(pending, &what).await?;

        Ok(ProxyDeployment { proxy, implementation, admin })
    }

    async fn invoke(&self, target: Address, call: &Invocation) -> Result<(), ScriptError> {
        let tx = TransactionRequest::default()
            .with_to(target)
            .with_input(encode_call(call)?);
        self.send_tx(tx, &format!("call {} on {}", call.signature(), target)).await?;

        Ok(())
    }

    async fn set_address_book(
        &self,
        module: Address,
        registry: Address,
    ) -> Result<(), ScriptError> {
        let what = format!("setAddressBook on {}", module);
        let pending = AddressBookAware::new(module, &self.provider)
            .setAddressBook(registry)
            .send()
            .await
            .map_err(|e| contract_error(&what, e))?;
        confirm(pending, &what).await?;

        Ok(())
    }

    async fn registry_get(&self, registry: Address, name: &str) -> Result<Address, ScriptError> {
        AddressBook::new(registry, &self.provider)
            .get(name.to_string())
            .call()
            .await
            .map_err(|e| ScriptError::ContractInteraction(format!("get({}): {}", name, e)))
    }

    async fn registry_set(
        &self,
        registry: Address,
        name: &str,
        address: Address,
    ) -> Result<(), ScriptError> {
        let what = format!("set({}, {})", name, address);
        let pending = AddressBook::new(registry, &self.provider)
            .set(name.to_string(), address)
            .send()
            .await
            .map_err(|e| contract_error(&what, e))?;
        confirm(pending, &what).await?;

        Ok(())
    }
}

/// Wait for a pending transaction and ensure it did not revert
async fn confirm(
    pending: PendingTransactionBuilder<Ethereum>,
    what: &str,
) -> Result<TransactionReceipt, ScriptError> {
    let tx_hash = *pending.tx_hash();
    debug!(%tx_hash, "awaiting {}", what);

    let receipt = pending
        .with_required_confirmations(NUM_CONFIRMATIONS)
        .get_receipt()
        .await
        .map_err(|e| ScriptError::Submission(format!("{}: {}", what, e)))?;

    if !receipt.status() {
        return Err(ScriptError::Reverted(format!("{} ({:#x})", what, tx_hash)));
    }

    Ok(receipt)
}

/// Classify a transport error; a node rejecting a transaction during gas
/// estimation because it would revert counts as a revert
fn transport_error(what: &str, err: TransportError) -> ScriptError {
    match err {
        TransportError::ErrorResp(payload) if payload.message.contains("revert") => {
            ScriptError::Reverted(format!("{}: {}", what, payload.message))
        }
        err => ScriptError::Submission(format!("{}: {}", what, err)),
    }
}

/// Classify an error returned by a contract call builder
fn contract_error(what: &str, err: ContractError) -> ScriptError {
    match err {
        ContractError::TransportError(err) => transport_error(what, err),
        err => ScriptError::Submission(format!("{}: {}", what, err)),
    }
}
