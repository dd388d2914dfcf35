use cosmwasm_std::{Addr, Binary, Uint128};
use ethers_core::abi::{encode, Token};
use ethers_core::types::{H160, H256, U256};
use ethers_core::utils::keccak256;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{parse_remote_address, to_fixed_32, BridgeError, Erc20Token};

const VALSET_DOMAIN: &[u8] = b"checkpoint";
const BATCH_DOMAIN: &[u8] = b"transactionBatch";
const CALL_DOMAIN: &[u8] = b"logicCall";

/// An outbound transfer waiting in the pool or carried by a batch.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct SendToRemote {
    pub id: u64,
    pub sender: Addr,
    pub destination: String,
    pub erc20_token: Erc20Token,
    pub erc20_fee: Erc20Token,
}

/// A fee-selected set of transfers for one token contract, signed by the
/// validator set and submitted to the remote chain as a unit.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct BatchTx {
    pub batch_nonce: u64,
    pub token_contract: String,
    pub transactions: Vec<SendToRemote>,
    /// Remote block height after which the remote contract refuses the
    /// batch. Zero while no remote height anchor has ever been attested.
    pub timeout_height: u64,
    /// Home block height at which the batch was created.
    pub block: u64,
}

impl BatchTx {
    pub fn fee_total(&self) -> Uint128 {
        self.transactions
            .iter()
            .fold(Uint128::zero(), |acc, tx| acc + tx.erc20_fee.amount)
    }

    pub fn checkpoint(&self, bridge_id: &str) -> Result<H256, BridgeError> {
        let mut amounts = Vec::with_capacity(self.transactions.len());
        let mut destinations = Vec::with_capacity(self.transactions.len());
        let mut fees = Vec::with_capacity(self.transactions.len());
        for tx in &self.transactions {
            amounts.push(Token::Uint(U256::from(tx.erc20_token.amount.u128())));
            destinations.push(Token::Address(address_or_zero(&tx.destination)?));
            fees.push(Token::Uint(U256::from(tx.erc20_fee.amount.u128())));
        }

        let preimage = encode(&[
            Token::FixedBytes(to_fixed_32(BATCH_DOMAIN)?.to_vec()),
            Token::FixedBytes(to_fixed_32(bridge_id.as_bytes())?.to_vec()),
            Token::Array(amounts),
            Token::Array(destinations),
            Token::Array(fees),
            Token::Uint(U256::from(self.batch_nonce)),
            Token::Address(address_or_zero(&self.token_contract)?),
            Token::Uint(U256::from(self.timeout_height)),
        ]);
        Ok(H256::from(keccak256(preimage)))
    }
}

/// One member of a signed validator set: remote signing address plus power
/// normalized to the `u32::MAX` scale.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct ValsetMember {
    pub remote_address: String,
    pub power: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct ValsetUpdate {
    pub nonce: u64,
    /// Members sorted by power descending, remote address ascending.
    pub members: Vec<ValsetMember>,
    /// Home block height at which the snapshot was taken.
    pub height: u64,
    pub reward_amount: Uint128,
    pub reward_token: Option<String>,
}

impl ValsetUpdate {
    pub fn checkpoint(&self, bridge_id: &str) -> Result<H256, BridgeError> {
        let mut addresses = Vec::with_capacity(self.members.len());
        let mut powers = Vec::with_capacity(self.members.len());
        for member in &self.members {
            addresses.push(Token::Address(address_or_zero(&member.remote_address)?));
            powers.push(Token::Uint(U256::from(member.power)));
        }

        let reward_token = match &self.reward_token {
            Some(contract) => address_or_zero(contract)?,
            None => H160::zero(),
        };

        let preimage = encode(&[
            Token::FixedBytes(to_fixed_32(VALSET_DOMAIN)?.to_vec()),
            Token::FixedBytes(to_fixed_32(bridge_id.as_bytes())?.to_vec()),
            Token::Uint(U256::from(self.nonce)),
            Token::Array(addresses),
            Token::Array(powers),
            Token::Uint(U256::from(self.reward_amount.u128())),
            Token::Address(reward_token),
        ]);
        Ok(H256::from(keccak256(preimage)))
    }
}

/// An arbitrary signed remote-chain invocation. Calls sharing an
/// invalidation scope supersede one another by invalidation nonce.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct ContractCallTx {
    pub invalidation_scope: Binary,
    pub invalidation_nonce: u64,
    pub logic_contract: String,
    pub payload: Binary,
    pub tokens: Vec<Erc20Token>,
    pub fees: Vec<Erc20Token>,
    pub timeout: u64,
    /// Home block height at which the call was stored.
    pub block: u64,
}

impl ContractCallTx {
    pub fn checkpoint(&self, bridge_id: &str) -> Result<H256, BridgeError> {
        let (token_amounts, token_contracts) = erc20_tokens(&self.tokens)?;
        let (fee_amounts, fee_contracts) = erc20_tokens(&self.fees)?;

        let preimage = encode(&[
            Token::FixedBytes(to_fixed_32(CALL_DOMAIN)?.to_vec()),
            Token::FixedBytes(to_fixed_32(bridge_id.as_bytes())?.to_vec()),
            Token::Array(token_amounts),
            Token::Array(token_contracts),
            Token::Array(fee_amounts),
            Token::Array(fee_contracts),
            Token::Address(address_or_zero(&self.logic_contract)?),
            Token::Bytes(self.payload.to_vec()),
            Token::Uint(U256::from(self.timeout)),
            Token::FixedBytes(to_fixed_32(self.invalidation_scope.as_slice())?.to_vec()),
            Token::Uint(U256::from(self.invalidation_nonce)),
        ]);
        Ok(H256::from(keccak256(preimage)))
    }
}

/// Anything validators sign and the remote contract verifies. Each variant
/// keeps its own store prefix in the keeper; the shared surface is exactly
/// checkpoint, nonce and timeout.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    Batch(BatchTx),
    Valset(ValsetUpdate),
    ContractCall(ContractCallTx),
}

impl Artifact {
    pub fn checkpoint(&self, bridge_id: &str) -> Result<H256, BridgeError> {
        match self {
            Artifact::Batch(batch) => batch.checkpoint(bridge_id),
            Artifact::Valset(valset) => valset.checkpoint(bridge_id),
            Artifact::ContractCall(call) => call.checkpoint(bridge_id),
        }
    }

    pub fn nonce(&self) -> u64 {
        match self {
            Artifact::Batch(batch) => batch.batch_nonce,
            Artifact::Valset(valset) => valset.nonce,
            Artifact::ContractCall(call) => call.invalidation_nonce,
        }
    }

    pub fn timeout(&self) -> u64 {
        match self {
            Artifact::Batch(batch) => batch.timeout_height,
            Artifact::Valset(_) => 0,
            Artifact::ContractCall(call) => call.timeout,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Artifact::Batch(_) => "batch",
            Artifact::Valset(_) => "valset",
            Artifact::ContractCall(_) => "contract_call",
        }
    }
}

/// A validator's signature over one artifact's checkpoint, stored for
/// relayer pickup and slashing accounting. Carries no power: power is read
/// from the staking table at quorum/slashing time.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct Confirmation {
    pub validator: Addr,
    pub remote_address: String,
    pub signature: Binary,
}

fn erc20_tokens(tokens: &[Erc20Token]) -> Result<(Vec<Token>, Vec<Token>), BridgeError> {
    let mut amounts = Vec::with_capacity(tokens.len());
    let mut contracts = Vec::with_capacity(tokens.len());
    for token in tokens {
        amounts.push(Token::Uint(U256::from(token.amount.u128())));
        contracts.push(Token::Address(address_or_zero(&token.contract)?));
    }
    Ok((amounts, contracts))
}

// Synthetic artifacts (evidence subjects) may carry unset address fields;
// the remote ABI treats those as the zero address.
fn address_or_zero(addr: &str) -> Result<H160, BridgeError> {
    if addr.is_empty() {
        return Ok(H160::zero());
    }
    parse_remote_address(addr)
}
