use cosmwasm_std::{DepsMut, Env, Event, Response, Storage};

use crate::attestation;
use crate::batch;
use crate::contract_call;
use crate::error::ContractError;
use crate::slashing;
use crate::state::{observed_heights, PARAMS};
use crate::traits::Externals;
use crate::valset;

/// Deterministic per-block orchestration. Runs in a fixed order: valset
/// rotation, the three slashing sweeps oldest-first, stale-attestation
/// pruning, expired-artifact pruning.
pub fn end_block(
    deps: DepsMut,
    env: &Env,
    ext: &mut Externals,
) -> Result<Response, ContractError> {
    let storage = deps.storage;
    let params = PARAMS.load(storage)?;
    let mut events: Vec<Event> = Vec::new();

    // the (home, remote) height anchor advances at claim-observation time

    if valset::rotation_due(storage, env, &*ext.staking)? {
        let (_, event) = valset::create_valset(storage, env, &*ext.staking)?;
        events.push(event);
    }

    events.extend(slashing::slash_unsigned_valsets(
        storage,
        env,
        ext.staking,
        &params,
    )?);
    events.extend(slashing::slash_unsigned_batches(
        storage,
        env,
        ext.staking,
        &params,
    )?);
    events.extend(slashing::slash_unsigned_claims(
        storage,
        env,
        ext.staking,
        &params,
    )?);

    attestation::prune_stale(storage, env, &params)?;

    events.extend(cancel_timed_out(storage)?);

    Ok(Response::new().add_events(events))
}

/// Cancel outbound artifacts the remote contract can no longer accept:
/// their recorded timeout sits below the last observed remote height.
fn cancel_timed_out(storage: &mut dyn Storage) -> Result<Vec<Event>, ContractError> {
    let heights = observed_heights(storage)?;
    if heights.remote_height == 0 {
        return Ok(vec![]);
    }

    let mut events = Vec::new();
    for stale in batch::all_batches(storage)? {
        if stale.timeout_height != 0 && stale.timeout_height < heights.remote_height {
            let (_, event) = batch::cancel_batch(storage, &stale.token_contract, stale.batch_nonce)?;
            events.push(event);
        }
    }
    for call in contract_call::all_calls(storage)? {
        if call.timeout != 0 && call.timeout < heights.remote_height {
            events.push(contract_call::cancel_call(
                storage,
                call.invalidation_scope.as_slice(),
                call.invalidation_nonce,
            )?);
        }
    }
    Ok(events)
}
