use cosmwasm_std::Uint128;
use ethers_core::types::H160;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{parse_remote_address, BridgeError};

/// An amount of a remote ERC-20, identified by its contract address.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct Erc20Token {
    pub contract: String,
    pub amount: Uint128,
}

impl Erc20Token {
    pub fn new(contract: impl Into<String>, amount: impl Into<Uint128>) -> Self {
        Self {
            contract: contract.into(),
            amount: amount.into(),
        }
    }

    pub fn contract_address(&self) -> Result<H160, BridgeError> {
        parse_remote_address(&self.contract)
    }
}

impl std::fmt::Display for Erc20Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.contract)
    }
}
