use cosmwasm_std::{Addr, Empty, Storage, Uint128};
use cw_storage_plus::{Item, Map};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use lib::{Attestation, BatchTx, Confirmation, ContractCallTx, Params, SendToRemote, ValsetUpdate};

pub const PARAMS: Item<Params> = Item::new("params");

// Monotonic counters. Persisted, never derived from iteration.
pub const LAST_TRANSFER_ID: Item<u64> = Item::new("last_transfer_id");
pub const LAST_ARTIFACT_NONCE: Item<u64> = Item::new("last_artifact_nonce");

pub const LAST_OBSERVED_EVENT_NONCE: Item<u64> = Item::new("last_observed_event_nonce");
pub const LAST_OBSERVED_VALSET_NONCE: Item<u64> = Item::new("last_observed_valset_nonce");
pub const LAST_OBSERVED_HEIGHTS: Item<ObservedHeights> = Item::new("last_observed_heights");

// Slashing watermarks.
pub const LAST_SLASHED_VALSET_NONCE: Item<u64> = Item::new("last_slashed_valset_nonce");
pub const LAST_SLASHED_BATCH_BLOCK: Item<u64> = Item::new("last_slashed_batch_block");

/// Primary transfer record, by id. Lives until the carrying batch executes
/// (or, while unbatched, until the sender cancels).
pub const TRANSFERS: Map<u64, SendToRemote> = Map::new("transfer");

/// Availability index over the pool: `(token, !fee, id) → ()`. Ascending
/// iteration yields fee-descending, id-ascending order.
pub const UNBATCHED: Map<(String, Vec<u8>, u64), Empty> = Map::new("unbatched");

pub const BATCHES: Map<(String, u64), BatchTx> = Map::new("batch");

/// Secondary batch index for the slashing sweep, `(block, nonce)`.
pub const BATCHES_BY_BLOCK: Map<(u64, u64), BatchTx> = Map::new("batch_by_block");

pub const VALSETS: Map<u64, ValsetUpdate> = Map::new("valset");

pub const CONTRACT_CALLS: Map<(Vec<u8>, u64), ContractCallTx> = Map::new("contract_call");

/// Confirmations keyed `(artifact key, validator)`, so one artifact's
/// signatures iterate contiguously.
pub const CONFIRMS: Map<(Vec<u8>, Addr), Confirmation> = Map::new("confirm");

pub const ATTESTATIONS: Map<(u64, Vec<u8>), Attestation> = Map::new("attestation");

/// Every checkpoint the keeper has ever legitimately produced.
pub const PAST_CHECKPOINTS: Map<Vec<u8>, Empty> = Map::new("past_checkpoint");

pub const LAST_EVENT_NONCE_BY_VALIDATOR: Map<Addr, u64> = Map::new("last_event_nonce_by_val");

// Delegate key registry, forward and reverse.
pub const DELEGATE_BY_VALIDATOR: Map<Addr, Addr> = Map::new("delegate_by_validator");
pub const VALIDATOR_BY_DELEGATE: Map<Addr, Addr> = Map::new("validator_by_delegate");
pub const REMOTE_BY_VALIDATOR: Map<Addr, String> = Map::new("remote_by_validator");
pub const VALIDATOR_BY_REMOTE: Map<String, Addr> = Map::new("validator_by_remote");

// Home-origin denoms and their remote ERC-20 representations.
pub const DENOM_TO_ERC20: Map<String, String> = Map::new("denom_to_erc20");
pub const ERC20_TO_DENOM: Map<String, String> = Map::new("erc20_to_denom");

/// The `(home, remote)` height pair carried by the most recently observed
/// claim. Anchors timeout projection.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, JsonSchema)]
pub struct ObservedHeights {
    pub home_height: u64,
    pub remote_height: u64,
}

pub fn next_transfer_id(storage: &mut dyn Storage) -> Result<u64, cosmwasm_std::StdError> {
    let id = LAST_TRANSFER_ID.may_load(storage)?.unwrap_or_default() + 1;
    LAST_TRANSFER_ID.save(storage, &id)?;
    Ok(id)
}

pub fn next_artifact_nonce(storage: &mut dyn Storage) -> Result<u64, cosmwasm_std::StdError> {
    let nonce = LAST_ARTIFACT_NONCE.may_load(storage)?.unwrap_or_default() + 1;
    LAST_ARTIFACT_NONCE.save(storage, &nonce)?;
    Ok(nonce)
}

/// Fee component of the availability index. Complemented so lexicographic
/// ascending order is numeric descending.
pub fn fee_index_key(fee: Uint128) -> Vec<u8> {
    (u128::MAX - fee.u128()).to_be_bytes().to_vec()
}

pub fn observed_heights(storage: &dyn Storage) -> Result<ObservedHeights, cosmwasm_std::StdError> {
    Ok(LAST_OBSERVED_HEIGHTS.may_load(storage)?.unwrap_or_default())
}

// Confirmation key space. Single-byte kind tags keep the three artifact
// families in disjoint prefixes.
const CONFIRM_KIND_BATCH: u8 = 0x01;
const CONFIRM_KIND_VALSET: u8 = 0x02;
const CONFIRM_KIND_CONTRACT_CALL: u8 = 0x03;

pub fn batch_confirm_key(token_contract: &str, batch_nonce: u64) -> Vec<u8> {
    let mut key = vec![CONFIRM_KIND_BATCH];
    key.extend_from_slice(token_contract.as_bytes());
    key.extend_from_slice(&batch_nonce.to_be_bytes());
    key
}

pub fn valset_confirm_key(nonce: u64) -> Vec<u8> {
    let mut key = vec![CONFIRM_KIND_VALSET];
    key.extend_from_slice(&nonce.to_be_bytes());
    key
}

pub fn contract_call_confirm_key(invalidation_scope: &[u8], invalidation_nonce: u64) -> Vec<u8> {
    let mut key = vec![CONFIRM_KIND_CONTRACT_CALL];
    key.extend_from_slice(invalidation_scope);
    key.extend_from_slice(&invalidation_nonce.to_be_bytes());
    key
}
