use cosmwasm_std::{Addr, Env, Event, Storage};
use ethers_core::types::{RecoveryMessage, Signature};
use std::convert::TryFrom;

use lib::Artifact;

use crate::error::ContractError;
use crate::state::{PARAMS, PAST_CHECKPOINTS, VALIDATOR_BY_REMOTE};
use crate::traits::Staking;

/// Evidence that a validator signed a checkpoint the keeper never
/// produced. A signature over any such checkpoint could move funds on the
/// remote contract, so the signer is slashed and jailed. Signatures over
/// legitimately produced checkpoints are rejected outright.
pub fn check_bad_signature_evidence(
    storage: &mut dyn Storage,
    env: &Env,
    staking: &mut dyn Staking,
    subject: &Artifact,
    signature: &[u8],
) -> Result<Event, ContractError> {
    let params = PARAMS.load(storage)?;
    let checkpoint = subject.checkpoint(&params.bridge_id)?;

    if PAST_CHECKPOINTS.has(storage, checkpoint.as_bytes().to_vec()) {
        return Err(ContractError::CheckpointExists);
    }

    let sig = Signature::try_from(signature).map_err(|_| ContractError::SignatureRecoveryFailed)?;
    let recovered = sig
        .recover(RecoveryMessage::Hash(checkpoint))
        .map_err(|_| ContractError::SignatureRecoveryFailed)?;

    let remote_address = format!("{:?}", recovered);
    let validator: Addr = VALIDATOR_BY_REMOTE
        .may_load(storage, remote_address.clone())?
        .ok_or(ContractError::Unknown {
            entity: "validator for remote address",
        })?;
    let staked = staking
        .validator(&validator)
        .ok_or(ContractError::Unknown { entity: "validator" })?;

    staking.slash(
        &validator,
        env.block.height,
        staked.power,
        params.slash_fraction_bad_remote_signature,
    );
    staking.jail(&validator);

    Ok(Event::new("EvidenceSlash")
        .add_attribute("reason", "bad_remote_signature")
        .add_attribute("validator", validator.as_str())
        .add_attribute("remote_address", remote_address)
        .add_attribute("artifact_kind", subject.kind())
        .add_attribute("checkpoint", hex::encode(checkpoint.as_bytes())))
}
