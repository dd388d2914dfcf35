use cosmwasm_std::{Empty, Env, Event, Order, StdResult, Storage};

use lib::ContractCallTx;

use crate::confirm;
use crate::error::ContractError;
use crate::state::{
    contract_call_confirm_key, observed_heights, CONTRACT_CALLS, PARAMS, PAST_CHECKPOINTS,
};

/// Persist an arbitrary signed remote invocation on behalf of another
/// home-chain module.
pub fn schedule_call(
    storage: &mut dyn Storage,
    env: &Env,
    mut call: ContractCallTx,
) -> Result<Event, ContractError> {
    let params = PARAMS.load(storage)?;

    let heights = observed_heights(storage)?;
    if call.timeout != 0 && call.timeout <= heights.remote_height {
        return Err(ContractError::TimeoutPassed {
            timeout: call.timeout,
            remote_height: heights.remote_height,
        });
    }

    let key = (call.invalidation_scope.to_vec(), call.invalidation_nonce);
    if CONTRACT_CALLS.has(storage, key.clone()) {
        return Err(ContractError::Duplicate {
            what: "contract call",
        });
    }

    call.block = env.block.height;
    CONTRACT_CALLS.save(storage, key, &call)?;

    let checkpoint = call.checkpoint(&params.bridge_id)?;
    PAST_CHECKPOINTS.save(storage, checkpoint.as_bytes().to_vec(), &Empty {})?;

    Ok(Event::new("ContractCallScheduled")
        .add_attribute("bridge_id", &params.bridge_id)
        .add_attribute(
            "invalidation_scope",
            hex::encode(call.invalidation_scope.as_slice()),
        )
        .add_attribute("invalidation_nonce", call.invalidation_nonce.to_string())
        .add_attribute("timeout", call.timeout.to_string()))
}

/// The attestation engine observed this call executing: delete it together
/// with every lower-nonce call it supersedes within the same scope.
pub fn call_executed(
    storage: &mut dyn Storage,
    invalidation_scope: &[u8],
    invalidation_nonce: u64,
) -> Result<Vec<Event>, ContractError> {
    let in_scope: Vec<u64> = CONTRACT_CALLS
        .prefix(invalidation_scope.to_vec())
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    if !in_scope.contains(&invalidation_nonce) {
        return Err(ContractError::Unknown {
            entity: "contract call",
        });
    }

    let mut events = Vec::new();
    for nonce in in_scope {
        if nonce > invalidation_nonce {
            continue;
        }
        delete_call(storage, invalidation_scope, nonce)?;
        if nonce < invalidation_nonce {
            events.push(cancel_event(invalidation_scope, nonce));
        }
    }
    events.push(
        Event::new("ContractCallExecuted")
            .add_attribute("invalidation_scope", hex::encode(invalidation_scope))
            .add_attribute("invalidation_nonce", invalidation_nonce.to_string()),
    );
    Ok(events)
}

/// Drop a timed-out call (end-block pruning).
pub fn cancel_call(
    storage: &mut dyn Storage,
    invalidation_scope: &[u8],
    invalidation_nonce: u64,
) -> Result<Event, ContractError> {
    if !CONTRACT_CALLS.has(storage, (invalidation_scope.to_vec(), invalidation_nonce)) {
        return Err(ContractError::Unknown {
            entity: "contract call",
        });
    }
    delete_call(storage, invalidation_scope, invalidation_nonce)?;
    Ok(cancel_event(invalidation_scope, invalidation_nonce))
}

pub fn get_call(
    storage: &dyn Storage,
    invalidation_scope: &[u8],
    invalidation_nonce: u64,
) -> StdResult<Option<ContractCallTx>> {
    CONTRACT_CALLS.may_load(storage, (invalidation_scope.to_vec(), invalidation_nonce))
}

pub fn all_calls(storage: &dyn Storage) -> StdResult<Vec<ContractCallTx>> {
    CONTRACT_CALLS
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, call)| call))
        .collect()
}

fn delete_call(
    storage: &mut dyn Storage,
    invalidation_scope: &[u8],
    invalidation_nonce: u64,
) -> StdResult<()> {
    CONTRACT_CALLS.remove(storage, (invalidation_scope.to_vec(), invalidation_nonce));
    confirm::delete_confirms(
        storage,
        &contract_call_confirm_key(invalidation_scope, invalidation_nonce),
    )
}

fn cancel_event(invalidation_scope: &[u8], invalidation_nonce: u64) -> Event {
    Event::new("ContractCallCanceled")
        .add_attribute("invalidation_scope", hex::encode(invalidation_scope))
        .add_attribute("invalidation_nonce", invalidation_nonce.to_string())
}
