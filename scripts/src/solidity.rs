//! Definitions of Solidity functions called during deployment

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface AddressBook {
        function set(string memory name, address addr) external;
        function get(string memory name) external view returns (address);
    }

    #[sol(rpc)]
    interface AddressBookAware {
        function setAddressBook(address addressBook) external;
    }

    #[sol(rpc)]
    interface ProxyAdmin {
        function upgradeAndCall(
            address proxy,
            address implementation,
            bytes memory data
        ) external payable;
    }
}
