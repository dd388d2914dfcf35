use cosmwasm_std::{Env, Event, Order, StdResult, Storage};
use cw_storage_plus::Bound;

use lib::Params;

use crate::confirm;
use crate::state::{
    batch_confirm_key, valset_confirm_key, ATTESTATIONS, BATCHES_BY_BLOCK,
    LAST_SLASHED_BATCH_BLOCK, LAST_SLASHED_VALSET_NONCE, VALSETS,
};
use crate::traits::Staking;

/// Slash and jail every validator that was bonded when a valset was
/// created and still has not confirmed it past the signing window.
pub fn slash_unsigned_valsets(
    storage: &mut dyn Storage,
    env: &Env,
    staking: &mut dyn Staking,
    params: &Params,
) -> Result<Vec<Event>, crate::ContractError> {
    let max_height = env.block.height.saturating_sub(params.signed_valsets_window);
    if max_height == 0 {
        return Ok(vec![]);
    }
    let last_slashed = LAST_SLASHED_VALSET_NONCE
        .may_load(storage)?
        .unwrap_or_default();

    let overdue: Vec<lib::ValsetUpdate> = VALSETS
        .range(
            storage,
            Some(Bound::exclusive(last_slashed)),
            None,
            Order::Ascending,
        )
        .filter_map(|item| match item {
            Ok((_, valset)) => {
                if valset.height < max_height {
                    Some(Ok(valset))
                } else {
                    None
                }
            }
            Err(err) => Some(Err(err)),
        })
        .collect::<StdResult<_>>()?;

    let mut events = Vec::new();
    for valset in overdue {
        let key = valset_confirm_key(valset.nonce);
        for validator in staking.bonded_validators() {
            if validator.bonded_height > valset.height {
                continue;
            }
            if confirm::has_confirm(storage, &key, &validator.operator) {
                continue;
            }
            staking.slash(
                &validator.operator,
                valset.height,
                validator.power,
                params.slash_fraction_valset,
            );
            staking.jail(&validator.operator);
            events.push(slash_event(
                "unsigned_valset",
                validator.operator.as_str(),
                valset.nonce,
            ));
        }
        LAST_SLASHED_VALSET_NONCE.save(storage, &valset.nonce)?;
    }
    Ok(events)
}

/// Same deadline for batches, windowed by the home block the batch was
/// created in.
pub fn slash_unsigned_batches(
    storage: &mut dyn Storage,
    env: &Env,
    staking: &mut dyn Staking,
    params: &Params,
) -> Result<Vec<Event>, crate::ContractError> {
    let max_height = env.block.height.saturating_sub(params.signed_batches_window);
    if max_height == 0 {
        return Ok(vec![]);
    }
    let last_slashed = LAST_SLASHED_BATCH_BLOCK
        .may_load(storage)?
        .unwrap_or_default();

    let overdue: Vec<lib::BatchTx> = BATCHES_BY_BLOCK
        .range(
            storage,
            Some(Bound::exclusive((last_slashed, u64::MAX))),
            Some(Bound::exclusive((max_height, 0u64))),
            Order::Ascending,
        )
        .map(|item| item.map(|(_, batch)| batch))
        .collect::<StdResult<_>>()?;

    let mut events = Vec::new();
    for batch in overdue {
        let key = batch_confirm_key(&batch.token_contract, batch.batch_nonce);
        for validator in staking.bonded_validators() {
            if validator.bonded_height > batch.block {
                continue;
            }
            if confirm::has_confirm(storage, &key, &validator.operator) {
                continue;
            }
            staking.slash(
                &validator.operator,
                batch.block,
                validator.power,
                params.slash_fraction_batch,
            );
            staking.jail(&validator.operator);
            events.push(slash_event(
                "unsigned_batch",
                validator.operator.as_str(),
                batch.batch_nonce,
            ));
        }
        LAST_SLASHED_BATCH_BLOCK.save(storage, &batch.block)?;
    }
    Ok(events)
}

/// Slash bonded validators that produced no claim for an event everyone
/// else observed long ago, then retire the attestation record. Deleting
/// the record is the watermark: an attestation is swept exactly once.
pub fn slash_unsigned_claims(
    storage: &mut dyn Storage,
    env: &Env,
    staking: &mut dyn Staking,
    params: &Params,
) -> Result<Vec<Event>, crate::ContractError> {
    let cutoff = env.block.height.saturating_sub(params.signed_claims_window);

    let overdue: Vec<((u64, Vec<u8>), lib::Attestation)> = ATTESTATIONS
        .range(storage, None, None, Order::Ascending)
        .filter_map(|item| match item {
            Ok((key, attestation)) => {
                if attestation.observed && attestation.height < cutoff {
                    Some(Ok((key, attestation)))
                } else {
                    None
                }
            }
            Err(err) => Some(Err(err)),
        })
        .collect::<StdResult<_>>()?;

    let mut events = Vec::new();
    for (key, attestation) in overdue {
        for validator in staking.bonded_validators() {
            if validator.bonded_height > attestation.height {
                continue;
            }
            if attestation.votes.contains(&validator.operator) {
                continue;
            }
            staking.slash(
                &validator.operator,
                attestation.height,
                validator.power,
                params.slash_fraction_claim,
            );
            events.push(slash_event(
                "unsigned_claim",
                validator.operator.as_str(),
                key.0,
            ));
        }
        ATTESTATIONS.remove(storage, key);
    }
    Ok(events)
}

fn slash_event(reason: &str, validator: &str, nonce: u64) -> Event {
    Event::new("ValidatorSlashed")
        .add_attribute("reason", reason.to_owned())
        .add_attribute("validator", validator.to_owned())
        .add_attribute("nonce", nonce.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::{mock_dependencies, mock_env};
    use cosmwasm_std::{Addr, Uint128};

    use lib::{Attestation, Claim, Erc20Token};
    use test_utils::RemoteSigner;

    use crate::batch;
    use crate::pool;
    use crate::state::PARAMS;
    use crate::testing::{five_val_setup, DEST, PRIVKEY_1, TOKEN};
    use crate::valset;

    fn past_window_env(window: u64) -> cosmwasm_std::Env {
        let mut env = mock_env();
        env.block.height += window + 1;
        env
    }

    fn confirm_artifact(
        storage: &mut dyn Storage,
        key: &[u8],
        validator: &str,
        signer: &RemoteSigner,
    ) {
        crate::state::CONFIRMS
            .save(
                storage,
                (key.to_vec(), Addr::unchecked(validator)),
                &lib::Confirmation {
                    validator: Addr::unchecked(validator),
                    remote_address: signer.address_string(),
                    signature: vec![0u8; 65].into(),
                },
            )
            .unwrap();
    }

    #[test]
    fn unsigned_valset_slashes_and_jails_the_holdout() {
        let mut deps = mock_dependencies();
        let (_, mut staking) = five_val_setup(deps.as_mut().storage);
        let (valset, _) =
            valset::create_valset(deps.as_mut().storage, &mock_env(), &staking).unwrap();
        let params = PARAMS.load(deps.as_ref().storage).unwrap();

        let signer = RemoteSigner::from_privkey(PRIVKEY_1);
        let key = valset_confirm_key(valset.nonce);
        for validator in ["validator1", "validator2", "validator3", "validator4"].iter() {
            confirm_artifact(deps.as_mut().storage, &key, validator, &signer);
        }

        // inside the window nothing happens
        let events =
            slash_unsigned_valsets(deps.as_mut().storage, &mock_env(), &mut staking, &params)
                .unwrap();
        assert!(events.is_empty());

        let env = past_window_env(params.signed_valsets_window);
        let events =
            slash_unsigned_valsets(deps.as_mut().storage, &env, &mut staking, &params).unwrap();
        assert_eq!(events.len(), 1);
        let holdout = Addr::unchecked("validator5");
        assert_eq!(staking.slashes_of(&holdout).len(), 1);
        assert!(staking.is_jailed(&holdout));

        // the nonce watermark stops a second sweep from double-slashing
        let events =
            slash_unsigned_valsets(deps.as_mut().storage, &env, &mut staking, &params).unwrap();
        assert!(events.is_empty());
        assert_eq!(staking.slashes_of(&holdout).len(), 1);
    }

    #[test]
    fn validators_bonded_after_the_valset_are_exempt() {
        let mut deps = mock_dependencies();
        let (_, mut staking) = five_val_setup(deps.as_mut().storage);
        let mut env = mock_env();
        env.block.height = 100;
        let (valset, _) = valset::create_valset(deps.as_mut().storage, &env, &staking).unwrap();
        let params = PARAMS.load(deps.as_ref().storage).unwrap();

        let late = Addr::unchecked("latecomer");
        staking.add_validator(&late, 100, valset.height + 1);

        let signer = RemoteSigner::from_privkey(PRIVKEY_1);
        let key = valset_confirm_key(valset.nonce);
        for validator in [
            "validator1",
            "validator2",
            "validator3",
            "validator4",
            "validator5",
        ]
        .iter()
        {
            confirm_artifact(deps.as_mut().storage, &key, validator, &signer);
        }

        let env = past_window_env(params.signed_valsets_window + 100);
        let events =
            slash_unsigned_valsets(deps.as_mut().storage, &env, &mut staking, &params).unwrap();
        assert!(events.is_empty());
        assert!(!staking.is_jailed(&late));
    }

    #[test]
    fn unsigned_batch_slashes_past_the_window() {
        let mut deps = mock_dependencies();
        let (_, mut staking) = five_val_setup(deps.as_mut().storage);
        let params = PARAMS.load(deps.as_ref().storage).unwrap();

        pool::add_to_pool(
            deps.as_mut().storage,
            Addr::unchecked("sender"),
            DEST.to_owned(),
            Erc20Token::new(TOKEN, 100u128),
            Erc20Token::new(TOKEN, 2u128),
        )
        .unwrap();
        let (built, _) = batch::build_batch(deps.as_mut().storage, &mock_env(), TOKEN, 1).unwrap();

        let signer = RemoteSigner::from_privkey(PRIVKEY_1);
        let key = batch_confirm_key(TOKEN, built.batch_nonce);
        for validator in ["validator1", "validator2", "validator3", "validator4"].iter() {
            confirm_artifact(deps.as_mut().storage, &key, validator, &signer);
        }

        let env = past_window_env(params.signed_batches_window);
        let events =
            slash_unsigned_batches(deps.as_mut().storage, &env, &mut staking, &params).unwrap();
        assert_eq!(events.len(), 1);
        assert!(staking.is_jailed(&Addr::unchecked("validator5")));

        // block watermark advanced; nothing left to sweep
        let events =
            slash_unsigned_batches(deps.as_mut().storage, &env, &mut staking, &params).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn unsigned_claim_slashes_nonvoters_and_retires_the_record() {
        let mut deps = mock_dependencies();
        let (_, mut staking) = five_val_setup(deps.as_mut().storage);
        let params = PARAMS.load(deps.as_ref().storage).unwrap();

        let claim = Claim::SendToHome {
            event_nonce: 1,
            remote_height: 50,
            token_contract: TOKEN.to_owned(),
            amount: Uint128::new(100),
            remote_sender: DEST.to_owned(),
            receiver: "receiver".to_owned(),
        };
        let key = (1u64, claim.hash().as_bytes().to_vec());
        ATTESTATIONS
            .save(
                deps.as_mut().storage,
                key.clone(),
                &Attestation {
                    observed: true,
                    votes: vec![
                        Addr::unchecked("validator1"),
                        Addr::unchecked("validator2"),
                        Addr::unchecked("validator3"),
                        Addr::unchecked("validator4"),
                    ],
                    height: mock_env().block.height,
                    claim,
                },
            )
            .unwrap();

        let env = past_window_env(params.signed_claims_window);
        let events =
            slash_unsigned_claims(deps.as_mut().storage, &env, &mut staking, &params).unwrap();
        assert_eq!(events.len(), 1);
        let holdout = Addr::unchecked("validator5");
        assert_eq!(staking.slashes_of(&holdout).len(), 1);
        // claim slashing does not jail
        assert!(!staking.is_jailed(&holdout));
        assert!(ATTESTATIONS.may_load(deps.as_ref().storage, key).unwrap().is_none());

        let events =
            slash_unsigned_claims(deps.as_mut().storage, &env, &mut staking, &params).unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn unobserved_attestations_are_not_claim_slashed() {
        let mut deps = mock_dependencies();
        let (_, mut staking) = five_val_setup(deps.as_mut().storage);
        let params = PARAMS.load(deps.as_ref().storage).unwrap();

        let claim = Claim::SendToHome {
            event_nonce: 1,
            remote_height: 50,
            token_contract: TOKEN.to_owned(),
            amount: Uint128::new(100),
            remote_sender: DEST.to_owned(),
            receiver: "receiver".to_owned(),
        };
        ATTESTATIONS
            .save(
                deps.as_mut().storage,
                (1u64, claim.hash().as_bytes().to_vec()),
                &Attestation {
                    observed: false,
                    votes: vec![Addr::unchecked("validator1")],
                    height: mock_env().block.height,
                    claim,
                },
            )
            .unwrap();

        let env = past_window_env(params.signed_claims_window);
        let events =
            slash_unsigned_claims(deps.as_mut().storage, &env, &mut staking, &params).unwrap();
        assert!(events.is_empty());
        assert!(staking.slashes.is_empty());
    }

    #[test]
    fn fresh_artifacts_are_not_swept() {
        let mut deps = mock_dependencies();
        let (_, mut staking) = five_val_setup(deps.as_mut().storage);
        let params = PARAMS.load(deps.as_ref().storage).unwrap();
        valset::create_valset(deps.as_mut().storage, &mock_env(), &staking).unwrap();

        let events =
            slash_unsigned_valsets(deps.as_mut().storage, &mock_env(), &mut staking, &params)
                .unwrap();
        assert!(events.is_empty());
        assert!(staking.slashes.is_empty());
    }
}
