use cosmwasm_std::{Addr, Api, Coin, Env, Event, Order, StdResult, Storage};

use lib::{parse_remote_address, Attestation, Claim, Params};

use crate::batch;
use crate::confirm;
use crate::contract_call;
use crate::error::ContractError;
use crate::pool;
use crate::state::{
    ObservedHeights, ATTESTATIONS, DENOM_TO_ERC20, ERC20_TO_DENOM, LAST_EVENT_NONCE_BY_VALIDATOR,
    LAST_OBSERVED_EVENT_NONCE, LAST_OBSERVED_HEIGHTS, LAST_OBSERVED_VALSET_NONCE,
};
use crate::traits::{Bank, Staking};
use crate::valset;

/// Ingest one validator's claim about a remote-chain event.
///
/// Votes accrete on the `(event_nonce, claim_hash)` attestation record;
/// the vote that pushes bonded power past two thirds marks the record
/// observed and applies the claim. Observation is strictly ordered: nonce
/// `n + 1` cannot be observed before `n`.
pub fn submit_claim(
    api: &dyn Api,
    storage: &mut dyn Storage,
    env: &Env,
    bank: &mut dyn Bank,
    staking: &mut dyn Staking,
    signer: &Addr,
    claim: Claim,
) -> Result<Vec<Event>, ContractError> {
    let validator = confirm::validator_for_signer(storage, signer)?;
    let bonded = staking
        .validator(&validator)
        .filter(|v| !v.jailed && v.power > 0)
        .ok_or_else(|| ContractError::invalid("claims must come from a bonded validator"))?;
    validate_claim(api, &claim)?;

    let event_nonce = claim.event_nonce();
    let claim_hash = claim.hash();
    let key = (event_nonce, claim_hash.as_bytes().to_vec());

    let mut attestation = match ATTESTATIONS.may_load(storage, key.clone())? {
        Some(attestation) => {
            if attestation.observed {
                return Err(ContractError::Duplicate { what: "claim" });
            }
            attestation
        }
        None => Attestation {
            observed: false,
            votes: vec![],
            height: env.block.height,
            claim: claim.clone(),
        },
    };

    let expected = last_event_nonce_for(storage, &validator)? + 1;
    if event_nonce != expected {
        return Err(ContractError::NonContiguousEventNonce {
            expected,
            got: event_nonce,
        });
    }

    if attestation.votes.contains(&validator) {
        return Err(ContractError::Duplicate { what: "claim" });
    }
    attestation.votes.push(validator.clone());
    ATTESTATIONS.save(storage, key.clone(), &attestation)?;
    LAST_EVENT_NONCE_BY_VALIDATOR.save(storage, validator.clone(), &event_nonce)?;

    let mut events = vec![Event::new("ClaimSubmitted")
        .add_attribute("claim_kind", claim.kind())
        .add_attribute("event_nonce", event_nonce.to_string())
        .add_attribute("claim_hash", hex::encode(claim_hash.as_bytes()))
        .add_attribute("validator", bonded.operator.as_str())];

    // observation stays in event-nonce order even if later nonces already
    // hold enough votes
    let last_observed = LAST_OBSERVED_EVENT_NONCE
        .may_load(storage)?
        .unwrap_or_default();
    if event_nonce == last_observed + 1 && past_quorum(staking, &attestation.votes) {
        attestation.observed = true;
        ATTESTATIONS.save(storage, key, &attestation)?;
        LAST_OBSERVED_EVENT_NONCE.save(storage, &event_nonce)?;
        LAST_OBSERVED_HEIGHTS.save(
            storage,
            &ObservedHeights {
                home_height: env.block.height,
                remote_height: claim.remote_height(),
            },
        )?;

        events.push(
            Event::new("ClaimObserved")
                .add_attribute("claim_kind", claim.kind())
                .add_attribute("event_nonce", event_nonce.to_string())
                .add_attribute("claim_hash", hex::encode(claim_hash.as_bytes())),
        );
        events.extend(apply_claim(api, storage, bank, &claim)?);
    }

    Ok(events)
}

/// A validator that has never voted starts at the last observed nonce, so
/// newly bonded validators are not forced to replay history.
pub fn last_event_nonce_for(storage: &dyn Storage, validator: &Addr) -> StdResult<u64> {
    match LAST_EVENT_NONCE_BY_VALIDATOR.may_load(storage, validator.clone())? {
        Some(nonce) => Ok(nonce),
        None => Ok(LAST_OBSERVED_EVENT_NONCE
            .may_load(storage)?
            .unwrap_or_default()),
    }
}

fn past_quorum(staking: &dyn Staking, votes: &[Addr]) -> bool {
    let total = staking.total_bonded_power() as u128;
    let voted: u128 = votes
        .iter()
        .filter_map(|validator| staking.validator(validator))
        .filter(|v| !v.jailed)
        .map(|v| v.power as u128)
        .sum();
    voted * 3 > total * 2
}

/// Dispatch an observed claim against keeper state.
pub(crate) fn apply_claim(
    api: &dyn Api,
    storage: &mut dyn Storage,
    bank: &mut dyn Bank,
    claim: &Claim,
) -> Result<Vec<Event>, ContractError> {
    match claim {
        Claim::SendToHome {
            token_contract,
            amount,
            receiver,
            ..
        } => {
            let receiver = api.addr_validate(receiver)?;
            let (denom, is_voucher) = pool::denom_for_contract(storage, token_contract)?;
            let coin = Coin {
                denom,
                amount: *amount,
            };
            if is_voucher {
                bank.mint(std::slice::from_ref(&coin))?;
            }
            bank.send_from_module(&receiver, std::slice::from_ref(&coin))?;
            Ok(vec![])
        }
        Claim::BatchExecuted {
            token_contract,
            batch_nonce,
            ..
        } => batch::batch_executed(storage, token_contract, *batch_nonce),
        Claim::ContractCallExecuted {
            invalidation_scope,
            invalidation_nonce,
            ..
        } => contract_call::call_executed(storage, invalidation_scope.as_slice(), *invalidation_nonce),
        Claim::Erc20Deployed {
            denom,
            token_contract,
            name,
            symbol,
            decimals,
            ..
        } => {
            if DENOM_TO_ERC20.has(storage, denom.clone())
                || ERC20_TO_DENOM.has(storage, token_contract.clone())
            {
                return Err(ContractError::Duplicate {
                    what: "erc20 representation",
                });
            }
            DENOM_TO_ERC20.save(storage, denom.clone(), token_contract)?;
            ERC20_TO_DENOM.save(storage, token_contract.clone(), denom)?;
            Ok(vec![Event::new("Erc20Deployed")
                .add_attribute("denom", denom)
                .add_attribute("token_contract", token_contract)
                .add_attribute("name", name)
                .add_attribute("symbol", symbol)
                .add_attribute("decimals", decimals.to_string())])
        }
        Claim::ValsetUpdated { valset_nonce, .. } => {
            LAST_OBSERVED_VALSET_NONCE.save(storage, valset_nonce)?;
            valset::prune_below(storage, *valset_nonce)?;
            Ok(vec![])
        }
    }
}

/// Drop attestations that never reached quorum inside the claims window.
pub fn prune_stale(storage: &mut dyn Storage, env: &Env, params: &Params) -> StdResult<usize> {
    let cutoff = env.block.height.saturating_sub(params.signed_claims_window);
    let stale: Vec<(u64, Vec<u8>)> = ATTESTATIONS
        .range(storage, None, None, Order::Ascending)
        .filter_map(|item| match item {
            Ok((key, attestation)) => {
                if !attestation.observed && attestation.height < cutoff {
                    Some(Ok(key))
                } else {
                    None
                }
            }
            Err(err) => Some(Err(err)),
        })
        .collect::<StdResult<_>>()?;
    let count = stale.len();
    for key in stale {
        ATTESTATIONS.remove(storage, key);
    }
    Ok(count)
}

fn validate_claim(api: &dyn Api, claim: &Claim) -> Result<(), ContractError> {
    if claim.event_nonce() == 0 {
        return Err(ContractError::invalid("event nonce must be positive"));
    }
    match claim {
        Claim::SendToHome {
            token_contract,
            remote_sender,
            receiver,
            ..
        } => {
            parse_remote_address(token_contract)?;
            parse_remote_address(remote_sender)?;
            api.addr_validate(receiver)?;
        }
        Claim::BatchExecuted { token_contract, .. } => {
            parse_remote_address(token_contract)?;
        }
        Claim::Erc20Deployed { token_contract, .. } => {
            parse_remote_address(token_contract)?;
        }
        Claim::ContractCallExecuted { .. } | Claim::ValsetUpdated { .. } => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::{mock_dependencies, mock_env};
    use cosmwasm_std::Uint128;

    use test_utils::RemoteSigner;

    use crate::testing::{five_val_setup, register_keys, MockBank, MockStaking, DEST, TOKEN};

    fn deposit_claim(event_nonce: u64) -> Claim {
        Claim::SendToHome {
            event_nonce,
            remote_height: 50,
            token_contract: TOKEN.to_owned(),
            amount: Uint128::new(1_000),
            remote_sender: DEST.to_owned(),
            receiver: "receiver".to_owned(),
        }
    }

    fn submit(
        deps: &mut cosmwasm_std::OwnedDeps<
            cosmwasm_std::MemoryStorage,
            cosmwasm_std::testing::MockApi,
            cosmwasm_std::testing::MockQuerier,
        >,
        bank: &mut MockBank,
        staking: &mut MockStaking,
        validator: &str,
        claim: Claim,
    ) -> Result<Vec<Event>, ContractError> {
        let api = deps.api;
        submit_claim(
            &api,
            deps.as_mut().storage,
            &mock_env(),
            bank,
            staking,
            &Addr::unchecked(validator),
            claim,
        )
    }

    #[test]
    fn quorum_observes_then_rejects_stragglers() {
        let mut deps = mock_dependencies();
        let (mut bank, mut staking) = five_val_setup(deps.as_mut().storage);

        // three of five equal votes is short of two thirds
        for validator in ["validator1", "validator2", "validator3"].iter() {
            let events = submit(
                &mut deps,
                &mut bank,
                &mut staking,
                validator,
                deposit_claim(1),
            )
            .unwrap();
            assert!(events.iter().all(|e| e.ty != "ClaimObserved"));
        }
        assert_eq!(bank.balance_of(&Addr::unchecked("receiver"), "bridge0x429881672b9ae42b8eba0e26cd9c73711b891ca5"), 0);

        // the fourth vote crosses quorum and credits the deposit
        let events = submit(
            &mut deps,
            &mut bank,
            &mut staking,
            "validator4",
            deposit_claim(1),
        )
        .unwrap();
        assert!(events.iter().any(|e| e.ty == "ClaimObserved"));
        assert_eq!(
            bank.balance_of(
                &Addr::unchecked("receiver"),
                "bridge0x429881672b9ae42b8eba0e26cd9c73711b891ca5"
            ),
            1_000
        );

        // a straggler on the observed claim is a duplicate, nothing re-applies
        let err = submit(
            &mut deps,
            &mut bank,
            &mut staking,
            "validator5",
            deposit_claim(1),
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::Duplicate { what: "claim" }));
        assert_eq!(
            bank.balance_of(
                &Addr::unchecked("receiver"),
                "bridge0x429881672b9ae42b8eba0e26cd9c73711b891ca5"
            ),
            1_000
        );
    }

    #[test]
    fn rejects_non_contiguous_nonces() {
        let mut deps = mock_dependencies();
        let (mut bank, mut staking) = five_val_setup(deps.as_mut().storage);

        let err = submit(
            &mut deps,
            &mut bank,
            &mut staking,
            "validator1",
            deposit_claim(2),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ContractError::NonContiguousEventNonce {
                expected: 1,
                got: 2
            }
        ));
    }

    #[test]
    fn same_validator_cannot_vote_twice() {
        let mut deps = mock_dependencies();
        let (mut bank, mut staking) = five_val_setup(deps.as_mut().storage);

        submit(
            &mut deps,
            &mut bank,
            &mut staking,
            "validator1",
            deposit_claim(1),
        )
        .unwrap();
        // the monotonicity guard catches the replay before the vote bitmap
        let err = submit(
            &mut deps,
            &mut bank,
            &mut staking,
            "validator1",
            deposit_claim(1),
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::NonContiguousEventNonce { .. }));
    }

    #[test]
    fn rejects_unbonded_claimants() {
        let mut deps = mock_dependencies();
        let (mut bank, mut staking) = five_val_setup(deps.as_mut().storage);
        let signer = RemoteSigner::from_privkey(
            "9999999999999999999999999999999999999999999999999999999999999999",
        );
        register_keys(
            deps.as_mut().storage,
            &Addr::unchecked("outsider"),
            &Addr::unchecked("outsider"),
            &signer.address_string(),
        );

        let err = submit(
            &mut deps,
            &mut bank,
            &mut staking,
            "outsider",
            deposit_claim(1),
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::Invalid { .. }));
    }

    #[test]
    fn competing_hash_at_one_nonce_stays_unobserved() {
        let mut deps = mock_dependencies();
        let (mut bank, mut staking) = five_val_setup(deps.as_mut().storage);

        let honest = deposit_claim(1);
        let mut forged = deposit_claim(1);
        if let Claim::SendToHome { amount, .. } = &mut forged {
            *amount = Uint128::new(999_999);
        }

        submit(&mut deps, &mut bank, &mut staking, "validator1", forged.clone()).unwrap();
        for validator in ["validator2", "validator3", "validator4", "validator5"].iter() {
            submit(&mut deps, &mut bank, &mut staking, validator, honest.clone()).unwrap();
        }

        let honest_att = ATTESTATIONS
            .load(
                deps.as_ref().storage,
                (1, honest.hash().as_bytes().to_vec()),
            )
            .unwrap();
        assert!(honest_att.observed);

        let forged_att = ATTESTATIONS
            .load(
                deps.as_ref().storage,
                (1, forged.hash().as_bytes().to_vec()),
            )
            .unwrap();
        assert!(!forged_att.observed);
        // nobody can vote for the losing hash anymore: every validator is
        // past nonce 1, and new voters would start at the observed nonce
        let err = submit(&mut deps, &mut bank, &mut staking, "validator1", forged).unwrap_err();
        assert!(matches!(err, ContractError::NonContiguousEventNonce { .. }));
    }

    #[test]
    fn deposit_of_home_origin_token_releases_escrow() {
        let mut deps = mock_dependencies();
        let (mut bank, _staking) = five_val_setup(deps.as_mut().storage);
        DENOM_TO_ERC20
            .save(deps.as_mut().storage, "uhome".to_owned(), &TOKEN.to_owned())
            .unwrap();
        ERC20_TO_DENOM
            .save(deps.as_mut().storage, TOKEN.to_owned(), &"uhome".to_owned())
            .unwrap();
        bank.set_module_balance("uhome", 5_000);

        let api = deps.api;
        apply_claim(
            &api,
            deps.as_mut().storage,
            &mut bank,
            &deposit_claim(1),
        )
        .unwrap();
        assert_eq!(bank.balance_of(&Addr::unchecked("receiver"), "uhome"), 1_000);
        assert_eq!(bank.module_balance("uhome"), 4_000);
        // nothing minted for a home-origin asset
        assert!(bank.minted.is_empty());
    }

    #[test]
    fn erc20_deployed_registers_once() {
        let mut deps = mock_dependencies();
        let (mut bank, _staking) = five_val_setup(deps.as_mut().storage);
        let claim = Claim::Erc20Deployed {
            event_nonce: 1,
            remote_height: 50,
            denom: "uhome".to_owned(),
            token_contract: TOKEN.to_owned(),
            name: "Home Token".to_owned(),
            symbol: "HOME".to_owned(),
            decimals: 6,
        };

        let api = deps.api;
        apply_claim(&api, deps.as_mut().storage, &mut bank, &claim).unwrap();
        assert_eq!(
            DENOM_TO_ERC20
                .load(deps.as_ref().storage, "uhome".to_owned())
                .unwrap(),
            TOKEN
        );

        let err = apply_claim(&api, deps.as_mut().storage, &mut bank, &claim).unwrap_err();
        assert!(matches!(err, ContractError::Duplicate { .. }));
    }

    #[test]
    fn valset_updated_advances_nonce_and_prunes() {
        let mut deps = mock_dependencies();
        let (mut bank, staking) = five_val_setup(deps.as_mut().storage);
        for _ in 0..3 {
            valset::create_valset(deps.as_mut().storage, &mock_env(), &staking).unwrap();
        }

        let claim = Claim::ValsetUpdated {
            event_nonce: 1,
            remote_height: 50,
            valset_nonce: 2,
            members: vec![],
            reward_amount: Uint128::zero(),
            reward_token: None,
        };
        let api = deps.api;
        apply_claim(&api, deps.as_mut().storage, &mut bank, &claim).unwrap();

        assert_eq!(
            LAST_OBSERVED_VALSET_NONCE
                .load(deps.as_ref().storage)
                .unwrap(),
            2
        );
        assert!(crate::state::VALSETS
            .may_load(deps.as_ref().storage, 1)
            .unwrap()
            .is_none());
        assert!(crate::state::VALSETS
            .may_load(deps.as_ref().storage, 2)
            .unwrap()
            .is_some());
    }

    #[test]
    fn prune_drops_only_stale_unobserved_attestations() {
        let mut deps = mock_dependencies();
        let (mut bank, mut staking) = five_val_setup(deps.as_mut().storage);

        submit(
            &mut deps,
            &mut bank,
            &mut staking,
            "validator1",
            deposit_claim(1),
        )
        .unwrap();

        let params = crate::state::PARAMS.load(deps.as_ref().storage).unwrap();
        let mut env = mock_env();
        env.block.height += params.signed_claims_window + 1;
        let pruned = prune_stale(deps.as_mut().storage, &env, &params).unwrap();
        assert_eq!(pruned, 1);
        assert!(ATTESTATIONS
            .may_load(
                deps.as_ref().storage,
                (1, deposit_claim(1).hash().as_bytes().to_vec())
            )
            .unwrap()
            .is_none());

        // fresh attestations survive
        submit(
            &mut deps,
            &mut bank,
            &mut staking,
            "validator2",
            deposit_claim(1),
        )
        .unwrap();
        let pruned = prune_stale(deps.as_mut().storage, &mock_env(), &params).unwrap();
        assert_eq!(pruned, 0);
    }
}
