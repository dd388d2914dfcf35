use cosmwasm_std::{Decimal, Empty, Env, Event, Order, StdResult, Storage};
use std::collections::BTreeMap;

use lib::{ValsetMember, ValsetUpdate};

use crate::confirm;
use crate::error::ContractError;
use crate::state::{
    next_artifact_nonce, valset_confirm_key, PARAMS, PAST_CHECKPOINTS, REMOTE_BY_VALIDATOR,
    VALSETS,
};
use crate::traits::Staking;

/// Fixed scale powers are normalized to before signing or diffing. Raw
/// staking powers are never signed; they differ between the home and
/// remote views of the set.
pub const POWER_SCALE: u64 = u32::MAX as u64;

/// Snapshot current bonded powers into a normalized, ordered member list.
/// Only validators with a registered remote key participate; an
/// unregistered member could never confirm anything.
pub fn snapshot_members(
    storage: &dyn Storage,
    staking: &dyn Staking,
) -> StdResult<Vec<ValsetMember>> {
    let mut raw = Vec::new();
    for validator in staking.bonded_validators() {
        if let Some(remote) = REMOTE_BY_VALIDATOR.may_load(storage, validator.operator.clone())? {
            raw.push((remote, validator.power));
        }
    }

    let total: u128 = raw.iter().map(|(_, power)| *power as u128).sum();
    if total == 0 {
        return Ok(vec![]);
    }

    let mut members: Vec<ValsetMember> = raw
        .into_iter()
        .map(|(remote_address, power)| ValsetMember {
            remote_address,
            power: (power as u128 * POWER_SCALE as u128 / total) as u64,
        })
        .collect();
    members.sort_by(|a, b| {
        b.power
            .cmp(&a.power)
            .then_with(|| a.remote_address.cmp(&b.remote_address))
    });
    Ok(members)
}

/// Normalized-scale drift between two member lists. A member missing on
/// one side contributes its full power.
pub fn power_diff(old: &[ValsetMember], new: &[ValsetMember]) -> Decimal {
    let mut powers: BTreeMap<&str, (u64, u64)> = BTreeMap::new();
    for member in old {
        powers.entry(member.remote_address.as_str()).or_default().0 = member.power;
    }
    for member in new {
        powers.entry(member.remote_address.as_str()).or_default().1 = member.power;
    }

    let diff: u64 = powers
        .values()
        .map(|(before, after)| {
            if before > after {
                before - after
            } else {
                after - before
            }
        })
        .sum();
    Decimal::from_ratio(diff, POWER_SCALE)
}

/// Persist a new valset at the next artifact nonce and record its
/// checkpoint as legitimately produced.
pub fn create_valset(
    storage: &mut dyn Storage,
    env: &Env,
    staking: &dyn Staking,
) -> Result<(ValsetUpdate, Event), ContractError> {
    let params = PARAMS.load(storage)?;
    let members = snapshot_members(storage, staking)?;
    if members.is_empty() {
        return Err(ContractError::invalid(
            "no bonded validators with registered remote keys",
        ));
    }

    let nonce = next_artifact_nonce(storage)?;
    let (reward_amount, reward_token) = match &params.valset_reward {
        Some(reward) => (reward.amount, Some(reward.contract.clone())),
        None => (cosmwasm_std::Uint128::zero(), None),
    };
    let valset = ValsetUpdate {
        nonce,
        members,
        height: env.block.height,
        reward_amount,
        reward_token,
    };
    VALSETS.save(storage, nonce, &valset)?;

    let checkpoint = valset.checkpoint(&params.bridge_id)?;
    PAST_CHECKPOINTS.save(storage, checkpoint.as_bytes().to_vec(), &Empty {})?;

    let event = Event::new("ValsetCreated")
        .add_attribute("bridge_id", &params.bridge_id)
        .add_attribute("bridge_chain_id", params.bridge_chain_id.to_string())
        .add_attribute("valset_nonce", nonce.to_string())
        .add_attribute("members", valset.members.len().to_string());
    Ok((valset, event))
}

pub fn latest_valset(storage: &dyn Storage) -> StdResult<Option<ValsetUpdate>> {
    VALSETS
        .range(storage, None, None, Order::Descending)
        .next()
        .transpose()
        .map(|entry| entry.map(|(_, valset)| valset))
}

/// Whether end-block must emit a fresh valset this block.
pub fn rotation_due(
    storage: &dyn Storage,
    env: &Env,
    staking: &dyn Staking,
) -> StdResult<bool> {
    // an unbonding validator must reach the remote contract before the
    // unbonding period elapses, whatever the power drift
    if staking.last_unbonding_height() == env.block.height {
        return Ok(true);
    }

    let candidate = snapshot_members(storage, staking)?;
    if candidate.is_empty() {
        return Ok(false);
    }
    match latest_valset(storage)? {
        None => Ok(true),
        Some(latest) => {
            let params = PARAMS.load(storage)?;
            Ok(power_diff(&latest.members, &candidate) > params.significant_power_diff)
        }
    }
}

/// Delete valsets superseded by an observed update, confirmations included.
pub fn prune_below(storage: &mut dyn Storage, nonce: u64) -> StdResult<Vec<u64>> {
    let stale: Vec<u64> = VALSETS
        .keys(storage, None, None, Order::Ascending)
        .take_while(|key| match key {
            Ok(key) => *key < nonce,
            Err(_) => true,
        })
        .collect::<StdResult<_>>()?;
    for key in &stale {
        VALSETS.remove(storage, *key);
        confirm::delete_confirms(storage, &valset_confirm_key(*key))?;
    }
    Ok(stale)
}
