//! Binding for the Greeter sample contract.
//!
//! The constructor stores a greeting and records the deployer as owner.
//! `kill` self-destructs when called by the owner.

alloy::sol! {
    #[allow(missing_docs)]
    #[sol(rpc, bytecode = "608060405234801561001057600080fd5b506040516104c43803806104c48339810180604052602081101561003357600080fd5b81019080805164010000000081111561004b57600080fd5b8201602081018481111561005e57600080fd5b815164010000000081118282018710171561007857600080fd5b5050600080546001600160a01b0319163317905580519093506100a492506001915060208401906100ab565b5050610146565b828054600181600116156101000203166002900490600052602060002090601f016020900481019282601f106100ec57805160ff1916838001178555610119565b82800160010185558215610119579182015b828111156101195782518255916020019190600101906100fe565b50610125929150610129565b5090565b61014391905b80821115610125576000815560010161012f565b90565b61036f806101556000396000f3fe608060405234801561001057600080fd5b50600436106100575760003560e01c806312065fe01461005c57806341c0e1b514610076578063893d20e814610080578063cfae3217146100a4578063d28c25d414610121575b600080fd5b6100646101c7565b60408051918252519081900360200190f35b61007e6101cd565b005b6100886101f0565b604080516001600160a01b039092168252519081900360200190f35b6100ac6101ff565b6040805160208082528351818301528351919283929083019185019080838360005b838110156100e65781810151838201526020016100ce565b50505050905090810190601f1680156101135780820380516001836020036101000a031916815260200191505b509250505060405180910390f35b61007e6004803603602081101561013757600080fd5b81019060208101813564010000000081111561015257600080fd5b82018360208201111561016457600080fd5b8035906020019184600183028401116401000000008311171561018657600080fd5b91908080601f016020809104026020016040519081016040528093929190818152602001838380828437600092019190915250929550610294945050505050565b30315b90565b6000546001600160a01b03163314156101ee576000546001600160a01b0316ff5b565b6000546001600160a01b031690565b60018054604080516020601f6002600019610100878916150201909516949094049384018190048102820181019092528281526060939092909183018282801561028a5780601f1061025f5761010080835404028352916020019161028a565b820191906000526020600020905b81548152906001019060200180831161026d57829003601f168201915b5050505050905090565b80516102a79060019060208401906102ab565b5050565b828054600181600116156101000203166002900490600052602060002090601f016020900481019282601f106102ec57805160ff1916838001178555610319565b82800160010185558215610319579182015b828111156103195782518255916020019190600101906102fe565b50610325929150610329565b5090565b6101ca91905b80821115610325576000815560010161032f56fea165627a7a723058208ee2f266947540cc69ccc597bcf0c27154171ad44093725d40f07e68b64ea3cc0029")]
    contract Greeter {
        constructor(string memory _greeting);

        function getBalance() public view returns (uint256);
        function kill() public;
        function getOwner() public view returns (address);
        function greet() public view returns (string memory);
        function changeGreeting(string memory _greeting) public;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::sol_types::SolCall;

    #[test]
    fn creation_code_is_embedded() {
        assert!(Greeter::BYTECODE.len() > 1000);
        assert!(Greeter::BYTECODE.starts_with(&[0x60, 0x80, 0x60, 0x40]));
    }

    #[test]
    fn runtime_dispatch_matches_selectors() {
        // The compiled dispatcher compares against these five selectors.
        assert_eq!(Greeter::getBalanceCall::SELECTOR, [0x12, 0x06, 0x5f, 0xe0]);
        assert_eq!(Greeter::killCall::SELECTOR, [0x41, 0xc0, 0xe1, 0xb5]);
        assert_eq!(Greeter::getOwnerCall::SELECTOR, [0x89, 0x3d, 0x20, 0xe8]);
        assert_eq!(Greeter::greetCall::SELECTOR, [0xcf, 0xae, 0x32, 0x17]);
        assert_eq!(Greeter::changeGreetingCall::SELECTOR, [0xd2, 0x8c, 0x25, 0xd4]);
    }
}
