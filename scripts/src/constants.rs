//! Constants used in the deploy scripts

/// The number of confirmations to wait for on every transaction
pub const NUM_CONFIRMATIONS: u64 = 1;

/// The storage slot containing the proxy admin contract address in the upgradeable proxy.
///
/// This is specified in EIP1967: https://eips.ethereum.org/EIPS/eip-1967#admin-address
pub const PROXY_ADMIN_STORAGE_SLOT: &str =
    "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

/// The artifact name of the proxy contract deployed in front of upgradeable modules
///
/// Compiled from https://github.com/OpenZeppelin/openzeppelin-contracts/blob/v5.0.0/contracts/proxy/transparent/TransparentUpgradeableProxy.sol
pub const PROXY_ARTIFACT: &str = "TransparentUpgradeableProxy";

/// The artifact name of the registry contract
pub const ADDRESS_BOOK_ARTIFACT: &str = "AddressBook";

/// The key under which the registry address is emitted
pub const ADDRESS_BOOK_OUTPUT_KEY: &str = "ADDRESSBOOK_ADDRESS";

/// The suffix appended to a module name to form its default output key
pub const OUTPUT_KEY_SUFFIX: &str = "_ADDRESS";

/// The default name of the initializer invoked at proxy creation
pub const DEFAULT_INITIALIZER: &str = "initialize";

/// The default directory in which compiled artifacts are looked up
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The extension of a compiled artifact file
pub const ARTIFACT_EXTENSION: &str = "json";

/// The extension of a Solidity source file, used as a directory name by Foundry and Hardhat
pub const SOLIDITY_EXTENSION: &str = "sol";

/// The deployments key in the deployments file
pub const DEPLOYMENTS_KEY: &str = "deployments";

// -----------------
// | Registry Keys |
// -----------------

/// The registry key of the DEX factory
pub const FACTORY_KEY: &str = "factory";

/// The registry key of the DEX router
pub const ROUTER_KEY: &str = "router";

/// The registry key of the multisig safe
pub const SAFE_KEY: &str = "safe";

/// The registry key of the protocol token
pub const TOKEN_KEY: &str = "token";

/// The registry key of the payment currency
pub const PAYMENT_KEY: &str = "payment";

/// The registry key of the pool
pub const POOL_KEY: &str = "pool";

/// The registry key of the add-liquidity module
pub const ADD_LIQUIDITY_KEY: &str = "addLiquidity";

/// The registry key of the auto-compound module
pub const AUTOCOMPOUND_KEY: &str = "autocompound";
