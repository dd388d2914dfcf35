use cosmwasm_std::{Empty, Env, Event, Order, StdError, StdResult, Storage};

use lib::{BatchTx, Params};

use crate::confirm;
use crate::error::ContractError;
use crate::pool;
use crate::state::{
    batch_confirm_key, next_artifact_nonce, observed_heights, BATCHES, BATCHES_BY_BLOCK, PARAMS,
    PAST_CHECKPOINTS,
};

/// Select the top-fee pool entries for one token into a new batch.
///
/// Fails if the selection would not out-bid the highest-nonce in-flight
/// batch for the token: a relayer must never be able to displace in-flight
/// work with an equally valued duplicate.
pub fn build_batch(
    storage: &mut dyn Storage,
    env: &Env,
    token_contract: &str,
    max_elements: u64,
) -> Result<(BatchTx, Event), ContractError> {
    if max_elements == 0 {
        return Err(ContractError::invalid("max elements value"));
    }
    let params = PARAMS.load(storage)?;

    let cap = max_elements.min(params.batch_tx_size) as usize;
    let mut selected = pool::unbatched_by_fee(storage, token_contract)?;
    selected.truncate(cap);

    if let Some(in_flight) = last_batch_by_token(storage, token_contract)? {
        let candidate_fees = selected
            .iter()
            .fold(cosmwasm_std::Uint128::zero(), |acc, tx| {
                acc + tx.erc20_fee.amount
            });
        if candidate_fees <= in_flight.fee_total() {
            return Err(ContractError::NotMoreProfitable {
                in_flight: in_flight.fee_total(),
            });
        }
    }

    if selected.is_empty() {
        return Err(ContractError::invalid("no unbatched transfers for token"));
    }

    for tx in &selected {
        pool::remove_available(storage, tx);
    }

    let nonce = next_artifact_nonce(storage)?;
    let batch = BatchTx {
        batch_nonce: nonce,
        token_contract: token_contract.to_owned(),
        transactions: selected,
        timeout_height: projected_timeout(storage, env, &params)?,
        block: env.block.height,
    };
    BATCHES.save(storage, (batch.token_contract.clone(), nonce), &batch)?;
    BATCHES_BY_BLOCK.save(storage, (batch.block, nonce), &batch)?;

    let checkpoint = batch.checkpoint(&params.bridge_id)?;
    PAST_CHECKPOINTS.save(storage, checkpoint.as_bytes().to_vec(), &Empty {})?;

    let event = Event::new("BatchCreated")
        .add_attribute("bridge_id", &params.bridge_id)
        .add_attribute("bridge_chain_id", params.bridge_chain_id.to_string())
        .add_attribute("batch_nonce", nonce.to_string())
        .add_attribute("token_contract", token_contract)
        .add_attribute("batch_size", batch.transactions.len().to_string())
        .add_attribute("fee_total", batch.fee_total().to_string())
        .add_attribute("timeout_height", batch.timeout_height.to_string());
    Ok((batch, event))
}

/// Project the remote height after which the batch times out. Zero until
/// both sides of the height anchor have been attested.
pub fn projected_timeout(storage: &dyn Storage, env: &Env, params: &Params) -> StdResult<u64> {
    let heights = observed_heights(storage)?;
    if heights.home_height == 0 || heights.remote_height == 0 {
        return Ok(0);
    }
    let projected_ms =
        env.block.height.saturating_sub(heights.home_height) * params.average_block_time;
    let projected_remote = projected_ms / params.average_remote_block_time + heights.remote_height;
    let blocks_to_add = params.target_batch_timeout / params.average_remote_block_time;
    Ok(projected_remote + blocks_to_add)
}

/// The attestation engine observed this batch executing on the remote
/// chain: destroy its transfers, cancel every lower-nonce batch (forever
/// unsubmittable behind the remote contract's advancing nonce), delete it.
pub fn batch_executed(
    storage: &mut dyn Storage,
    token_contract: &str,
    nonce: u64,
) -> Result<Vec<Event>, ContractError> {
    let batch = get_batch(storage, token_contract, nonce)?.ok_or(ContractError::Unknown {
        entity: "batch nonce",
    })?;

    for tx in &batch.transactions {
        pool::destroy(storage, tx);
    }

    // Materialize before mutating; the sweep stays total even when a
    // cancellation fails, and replicas agree on the first error.
    let mut first_err = None;
    let mut events = Vec::new();
    for stale in all_batches(storage)? {
        if stale.batch_nonce >= batch.batch_nonce {
            continue;
        }
        match cancel_batch(storage, &stale.token_contract, stale.batch_nonce) {
            Ok((_, event)) => events.push(event),
            Err(err) => {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
    }

    delete_batch(storage, &batch)?;

    if let Some(err) = first_err {
        return Err(err);
    }

    events.push(
        Event::new("BatchExecuted")
            .add_attribute("batch_nonce", nonce.to_string())
            .add_attribute("token_contract", token_contract),
    );
    Ok(events)
}

/// Release a batch's transfers back to the pool and delete it.
pub fn cancel_batch(
    storage: &mut dyn Storage,
    token_contract: &str,
    nonce: u64,
) -> Result<(BatchTx, Event), ContractError> {
    let batch = get_batch(storage, token_contract, nonce)?.ok_or(ContractError::Unknown {
        entity: "batch nonce",
    })?;

    for tx in &batch.transactions {
        pool::requeue(storage, tx)?;
    }
    delete_batch(storage, &batch)?;

    let event = Event::new("BatchCanceled")
        .add_attribute("batch_nonce", nonce.to_string())
        .add_attribute("token_contract", token_contract);
    Ok((batch, event))
}

pub fn get_batch(
    storage: &dyn Storage,
    token_contract: &str,
    nonce: u64,
) -> StdResult<Option<BatchTx>> {
    let batch = BATCHES.may_load(storage, (token_contract.to_owned(), nonce))?;
    if let Some(batch) = &batch {
        ensure_consistent(batch)?;
    }
    Ok(batch)
}

pub fn last_batch_by_token(storage: &dyn Storage, token_contract: &str) -> StdResult<Option<BatchTx>> {
    let batch = BATCHES
        .prefix(token_contract.to_owned())
        .range(storage, None, None, Order::Descending)
        .next()
        .transpose()?
        .map(|(_, batch)| batch);
    if let Some(batch) = &batch {
        ensure_consistent(batch)?;
    }
    Ok(batch)
}

/// Every live batch, nonce descending across all tokens.
pub fn all_batches(storage: &dyn Storage) -> StdResult<Vec<BatchTx>> {
    let mut batches: Vec<BatchTx> = BATCHES
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, batch)| batch))
        .collect::<StdResult<_>>()?;
    for batch in &batches {
        ensure_consistent(batch)?;
    }
    batches.sort_by(|a, b| b.batch_nonce.cmp(&a.batch_nonce));
    Ok(batches)
}

fn delete_batch(storage: &mut dyn Storage, batch: &BatchTx) -> StdResult<()> {
    BATCHES.remove(storage, (batch.token_contract.clone(), batch.batch_nonce));
    BATCHES_BY_BLOCK.remove(storage, (batch.block, batch.batch_nonce));
    confirm::delete_confirms(
        storage,
        &batch_confirm_key(&batch.token_contract, batch.batch_nonce),
    )
}

// A persisted transfer disagreeing with its batch's token contract is
// store corruption, not something to repair on read.
fn ensure_consistent(batch: &BatchTx) -> StdResult<()> {
    for tx in &batch.transactions {
        if tx.erc20_token.contract != batch.token_contract {
            return Err(StdError::generic_err(
                "corrupt batch: transfer token contract mismatch",
            ));
        }
    }
    Ok(())
}
