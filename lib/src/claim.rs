use cosmwasm_std::{Addr, Binary, Uint128};
use ethers_core::types::H256;
use ethers_core::utils::keccak256;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ValsetMember;

/// A validator's assertion that a specific remote-chain event occurred.
/// Event nonces come from one monotonic sequence on the remote contract;
/// `remote_height` is the block the event was emitted in and doubles as the
/// height anchor for timeout projection.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Claim {
    /// Lock of an asset on the remote chain, to be credited on the home side.
    SendToHome {
        event_nonce: u64,
        remote_height: u64,
        token_contract: String,
        amount: Uint128,
        remote_sender: String,
        receiver: String,
    },
    BatchExecuted {
        event_nonce: u64,
        remote_height: u64,
        token_contract: String,
        batch_nonce: u64,
    },
    ContractCallExecuted {
        event_nonce: u64,
        remote_height: u64,
        invalidation_scope: Binary,
        invalidation_nonce: u64,
    },
    /// The remote contract deployed an ERC-20 representation for a
    /// home-origin denom.
    Erc20Deployed {
        event_nonce: u64,
        remote_height: u64,
        denom: String,
        token_contract: String,
        name: String,
        symbol: String,
        decimals: u8,
    },
    ValsetUpdated {
        event_nonce: u64,
        remote_height: u64,
        valset_nonce: u64,
        members: Vec<ValsetMember>,
        reward_amount: Uint128,
        reward_token: Option<String>,
    },
}

impl Claim {
    pub fn event_nonce(&self) -> u64 {
        match self {
            Claim::SendToHome { event_nonce, .. }
            | Claim::BatchExecuted { event_nonce, .. }
            | Claim::ContractCallExecuted { event_nonce, .. }
            | Claim::Erc20Deployed { event_nonce, .. }
            | Claim::ValsetUpdated { event_nonce, .. } => *event_nonce,
        }
    }

    pub fn remote_height(&self) -> u64 {
        match self {
            Claim::SendToHome { remote_height, .. }
            | Claim::BatchExecuted { remote_height, .. }
            | Claim::ContractCallExecuted { remote_height, .. }
            | Claim::Erc20Deployed { remote_height, .. }
            | Claim::ValsetUpdated { remote_height, .. } => *remote_height,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Claim::SendToHome { .. } => "send_to_home",
            Claim::BatchExecuted { .. } => "batch_executed",
            Claim::ContractCallExecuted { .. } => "contract_call_executed",
            Claim::Erc20Deployed { .. } => "erc20_deployed",
            Claim::ValsetUpdated { .. } => "valset_updated",
        }
    }

    /// Hash of the observed event. Two validators reporting the same event
    /// produce the same hash; the submitting validator is deliberately not
    /// part of the preimage.
    pub fn hash(&self) -> H256 {
        H256::from(keccak256(self.preimage()))
    }

    // Fixed field-order preimage, tagged per claim kind so distinct kinds
    // never collide.
    fn preimage(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Claim::SendToHome {
                event_nonce,
                remote_height,
                token_contract,
                amount,
                remote_sender,
                receiver,
            } => {
                buf.push(0x01);
                buf.extend_from_slice(&event_nonce.to_be_bytes());
                buf.extend_from_slice(&remote_height.to_be_bytes());
                buf.extend_from_slice(token_contract.as_bytes());
                buf.extend_from_slice(&amount.u128().to_be_bytes());
                buf.extend_from_slice(remote_sender.as_bytes());
                buf.extend_from_slice(receiver.as_bytes());
            }
            Claim::BatchExecuted {
                event_nonce,
                remote_height,
                token_contract,
                batch_nonce,
            } => {
                buf.push(0x02);
                buf.extend_from_slice(&event_nonce.to_be_bytes());
                buf.extend_from_slice(&remote_height.to_be_bytes());
                buf.extend_from_slice(token_contract.as_bytes());
                buf.extend_from_slice(&batch_nonce.to_be_bytes());
            }
            Claim::ContractCallExecuted {
                event_nonce,
                remote_height,
                invalidation_scope,
                invalidation_nonce,
            } => {
                buf.push(0x03);
                buf.extend_from_slice(&event_nonce.to_be_bytes());
                buf.extend_from_slice(&remote_height.to_be_bytes());
                buf.extend_from_slice(invalidation_scope.as_slice());
                buf.extend_from_slice(&invalidation_nonce.to_be_bytes());
            }
            Claim::Erc20Deployed {
                event_nonce,
                remote_height,
                denom,
                token_contract,
                name,
                symbol,
                decimals,
            } => {
                buf.push(0x04);
                buf.extend_from_slice(&event_nonce.to_be_bytes());
                buf.extend_from_slice(&remote_height.to_be_bytes());
                buf.extend_from_slice(denom.as_bytes());
                buf.extend_from_slice(token_contract.as_bytes());
                buf.extend_from_slice(name.as_bytes());
                buf.extend_from_slice(symbol.as_bytes());
                buf.push(*decimals);
            }
            Claim::ValsetUpdated {
                event_nonce,
                remote_height,
                valset_nonce,
                members,
                reward_amount,
                reward_token,
            } => {
                buf.push(0x05);
                buf.extend_from_slice(&event_nonce.to_be_bytes());
                buf.extend_from_slice(&remote_height.to_be_bytes());
                buf.extend_from_slice(&valset_nonce.to_be_bytes());
                for member in members {
                    buf.extend_from_slice(&member.power.to_be_bytes());
                    buf.extend_from_slice(member.remote_address.as_bytes());
                }
                buf.extend_from_slice(&reward_amount.u128().to_be_bytes());
                if let Some(token) = reward_token {
                    buf.extend_from_slice(token.as_bytes());
                }
            }
        }
        buf
    }
}

/// Which validators have claimed one `(event_nonce, claim_hash)` pair, and
/// whether the claim crossed quorum and was applied.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct Attestation {
    pub observed: bool,
    pub votes: Vec<Addr>,
    /// Home block height at which the attestation record was created.
    pub height: u64,
    pub claim: Claim,
}
