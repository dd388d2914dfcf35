use cosmwasm_std::{Addr, Event, Order, StdResult, Storage};
use ethers_core::types::{RecoveryMessage, Signature};
use std::convert::TryFrom;

use lib::{parse_remote_address, Artifact, Confirmation};
use msg::keeper::ArtifactId;

use crate::batch;
use crate::error::ContractError;
use crate::state::{
    batch_confirm_key, contract_call_confirm_key, valset_confirm_key, CONFIRMS, CONTRACT_CALLS,
    PARAMS, REMOTE_BY_VALIDATOR, VALIDATOR_BY_DELEGATE, VALSETS,
};

/// Store key for one artifact's confirmations.
pub fn confirm_key(artifact: &ArtifactId) -> Vec<u8> {
    match artifact {
        ArtifactId::Batch {
            token_contract,
            batch_nonce,
        } => batch_confirm_key(token_contract, *batch_nonce),
        ArtifactId::Valset { nonce } => valset_confirm_key(*nonce),
        ArtifactId::ContractCall {
            invalidation_scope,
            invalidation_nonce,
        } => contract_call_confirm_key(invalidation_scope.as_slice(), *invalidation_nonce),
    }
}

pub fn load_artifact(
    storage: &dyn Storage,
    artifact: &ArtifactId,
) -> Result<Artifact, ContractError> {
    match artifact {
        ArtifactId::Batch {
            token_contract,
            batch_nonce,
        } => batch::get_batch(storage, token_contract, *batch_nonce)?
            .map(Artifact::Batch)
            .ok_or(ContractError::Unknown {
                entity: "batch nonce",
            }),
        ArtifactId::Valset { nonce } => VALSETS
            .may_load(storage, *nonce)?
            .map(Artifact::Valset)
            .ok_or(ContractError::Unknown {
                entity: "valset nonce",
            }),
        ArtifactId::ContractCall {
            invalidation_scope,
            invalidation_nonce,
        } => CONTRACT_CALLS
            .may_load(storage, (invalidation_scope.to_vec(), *invalidation_nonce))?
            .map(Artifact::ContractCall)
            .ok_or(ContractError::Unknown {
                entity: "contract call",
            }),
    }
}

/// Resolve a message signer to the validator it acts for: either a
/// registered delegate or the validator operator itself.
pub fn validator_for_signer(storage: &dyn Storage, signer: &Addr) -> Result<Addr, ContractError> {
    if let Some(validator) = VALIDATOR_BY_DELEGATE.may_load(storage, signer.clone())? {
        return Ok(validator);
    }
    if REMOTE_BY_VALIDATOR.has(storage, signer.clone()) {
        return Ok(signer.clone());
    }
    Err(ContractError::Unknown {
        entity: "delegate keys for signer",
    })
}

/// Record a validator signature over an artifact's checkpoint.
///
/// Accepted iff the artifact exists, the validator has registered its
/// remote key, the signature recovers to that key over the canonical
/// checkpoint, and no confirmation exists yet for this pair.
pub fn submit_confirm(
    storage: &mut dyn Storage,
    signer: &Addr,
    artifact: &ArtifactId,
    remote_address: &str,
    signature: &[u8],
) -> Result<Event, ContractError> {
    let params = PARAMS.load(storage)?;
    let subject = load_artifact(storage, artifact)?;
    let validator = validator_for_signer(storage, signer)?;

    let registered = REMOTE_BY_VALIDATOR
        .may_load(storage, validator.clone())?
        .ok_or_else(|| ContractError::invalid("validator has no registered remote address"))?;
    let registered = parse_remote_address(&registered)?;
    if parse_remote_address(remote_address)? != registered {
        return Err(ContractError::invalid(
            "remote address does not match registered key",
        ));
    }

    let checkpoint = subject.checkpoint(&params.bridge_id)?;
    let sig =
        Signature::try_from(signature).map_err(|_| ContractError::SignatureRecoveryFailed)?;
    let recovered = sig
        .recover(RecoveryMessage::Hash(checkpoint))
        .map_err(|_| ContractError::SignatureRecoveryFailed)?;
    if recovered != registered {
        return Err(ContractError::invalid(
            "signature does not recover to registered remote address",
        ));
    }

    let key = (confirm_key(artifact), validator.clone());
    if CONFIRMS.has(storage, key.clone()) {
        return Err(ContractError::Duplicate {
            what: "confirmation",
        });
    }
    CONFIRMS.save(
        storage,
        key,
        &Confirmation {
            validator: validator.clone(),
            remote_address: format!("{:?}", registered),
            signature: signature.to_vec().into(),
        },
    )?;

    Ok(Event::new("ConfirmSubmitted")
        .add_attribute("artifact_kind", subject.kind())
        .add_attribute("artifact_nonce", subject.nonce().to_string())
        .add_attribute("validator", validator.as_str())
        .add_attribute("checkpoint", hex::encode(checkpoint.as_bytes())))
}

pub fn confirms_for(storage: &dyn Storage, key: &[u8]) -> StdResult<Vec<Confirmation>> {
    CONFIRMS
        .prefix(key.to_vec())
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|(_, confirm)| confirm))
        .collect()
}

pub fn has_confirm(storage: &dyn Storage, key: &[u8], validator: &Addr) -> bool {
    CONFIRMS.has(storage, (key.to_vec(), validator.clone()))
}

/// Drop every confirmation for one artifact. Runs inside the same
/// transaction as the artifact's own deletion, so confirmations never
/// strand.
pub fn delete_confirms(storage: &mut dyn Storage, key: &[u8]) -> StdResult<()> {
    let validators: Vec<Addr> = CONFIRMS
        .prefix(key.to_vec())
        .keys(storage, None, None, Order::Ascending)
        .collect::<StdResult<_>>()?;
    for validator in validators {
        CONFIRMS.remove(storage, (key.to_vec(), validator));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmwasm_std::testing::mock_dependencies;
    use cosmwasm_std::Uint128;

    use lib::{ValsetMember, ValsetUpdate};
    use test_utils::RemoteSigner;

    use crate::testing::{register_keys, store_test_params, PRIVKEY_1, PRIVKEY_2};

    fn store_valset(storage: &mut dyn Storage, nonce: u64, signer: &RemoteSigner) -> ValsetUpdate {
        let valset = ValsetUpdate {
            nonce,
            members: vec![ValsetMember {
                remote_address: signer.address_string(),
                power: 1000,
            }],
            height: 10,
            reward_amount: Uint128::zero(),
            reward_token: None,
        };
        VALSETS.save(storage, nonce, &valset).unwrap();
        valset
    }

    #[test]
    fn accepts_a_valid_confirmation() {
        let mut deps = mock_dependencies();
        store_test_params(deps.as_mut().storage);
        let signer = RemoteSigner::from_privkey(PRIVKEY_1);
        let validator = Addr::unchecked("validator1");
        let delegate = Addr::unchecked("delegate1");
        register_keys(
            deps.as_mut().storage,
            &validator,
            &delegate,
            &signer.address_string(),
        );
        let valset = store_valset(deps.as_mut().storage, 1, &signer);

        let checkpoint = valset.checkpoint("bridge-test").unwrap();
        let sig = signer.sign_digest_bytes(checkpoint);
        let artifact = ArtifactId::Valset { nonce: 1 };

        let event = submit_confirm(
            deps.as_mut().storage,
            &delegate,
            &artifact,
            &signer.address_string(),
            &sig,
        )
        .unwrap();
        assert_eq!(event.ty, "ConfirmSubmitted");

        let confirms = confirms_for(deps.as_ref().storage, &confirm_key(&artifact)).unwrap();
        assert_eq!(confirms.len(), 1);
        assert_eq!(confirms[0].validator, validator);
        assert!(has_confirm(
            deps.as_ref().storage,
            &confirm_key(&artifact),
            &validator
        ));
    }

    #[test]
    fn rejects_unknown_artifact() {
        let mut deps = mock_dependencies();
        store_test_params(deps.as_mut().storage);
        let signer = RemoteSigner::from_privkey(PRIVKEY_1);
        let validator = Addr::unchecked("validator1");
        register_keys(
            deps.as_mut().storage,
            &validator,
            &validator,
            &signer.address_string(),
        );

        let err = submit_confirm(
            deps.as_mut().storage,
            &validator,
            &ArtifactId::Valset { nonce: 9 },
            &signer.address_string(),
            &[0u8; 65],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ContractError::Unknown {
                entity: "valset nonce"
            }
        ));
    }

    #[test]
    fn rejects_signer_without_delegate_keys() {
        let mut deps = mock_dependencies();
        store_test_params(deps.as_mut().storage);
        let signer = RemoteSigner::from_privkey(PRIVKEY_1);
        store_valset(deps.as_mut().storage, 1, &signer);

        let err = submit_confirm(
            deps.as_mut().storage,
            &Addr::unchecked("stranger"),
            &ArtifactId::Valset { nonce: 1 },
            &signer.address_string(),
            &[0u8; 65],
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::Unknown { .. }));
    }

    #[test]
    fn rejects_signature_from_another_key() {
        let mut deps = mock_dependencies();
        store_test_params(deps.as_mut().storage);
        let signer = RemoteSigner::from_privkey(PRIVKEY_1);
        let other = RemoteSigner::from_privkey(PRIVKEY_2);
        let validator = Addr::unchecked("validator1");
        register_keys(
            deps.as_mut().storage,
            &validator,
            &validator,
            &signer.address_string(),
        );
        let valset = store_valset(deps.as_mut().storage, 1, &signer);

        let checkpoint = valset.checkpoint("bridge-test").unwrap();
        let sig = other.sign_digest_bytes(checkpoint);
        let err = submit_confirm(
            deps.as_mut().storage,
            &validator,
            &ArtifactId::Valset { nonce: 1 },
            &signer.address_string(),
            &sig,
        )
        .unwrap_err();
        assert!(matches!(err, ContractError::Invalid { .. }));
    }

    #[test]
    fn second_submission_is_rejected_not_overwritten() {
        let mut deps = mock_dependencies();
        store_test_params(deps.as_mut().storage);
        let signer = RemoteSigner::from_privkey(PRIVKEY_1);
        let validator = Addr::unchecked("validator1");
        register_keys(
            deps.as_mut().storage,
            &validator,
            &validator,
            &signer.address_string(),
        );
        let valset = store_valset(deps.as_mut().storage, 1, &signer);

        let checkpoint = valset.checkpoint("bridge-test").unwrap();
        let sig = signer.sign_digest_bytes(checkpoint);
        let artifact = ArtifactId::Valset { nonce: 1 };

        submit_confirm(
            deps.as_mut().storage,
            &validator,
            &artifact,
            &signer.address_string(),
            &sig,
        )
        .unwrap();
        let err = submit_confirm(
            deps.as_mut().storage,
            &validator,
            &artifact,
            &signer.address_string(),
            &sig,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ContractError::Duplicate {
                what: "confirmation"
            }
        ));
    }

    #[test]
    fn deleting_confirms_empties_the_prefix() {
        let mut deps = mock_dependencies();
        store_test_params(deps.as_mut().storage);
        let signer = RemoteSigner::from_privkey(PRIVKEY_1);
        let validator = Addr::unchecked("validator1");
        register_keys(
            deps.as_mut().storage,
            &validator,
            &validator,
            &signer.address_string(),
        );
        let valset = store_valset(deps.as_mut().storage, 1, &signer);

        let checkpoint = valset.checkpoint("bridge-test").unwrap();
        let sig = signer.sign_digest_bytes(checkpoint);
        let artifact = ArtifactId::Valset { nonce: 1 };
        submit_confirm(
            deps.as_mut().storage,
            &validator,
            &artifact,
            &signer.address_string(),
            &sig,
        )
        .unwrap();

        delete_confirms(deps.as_mut().storage, &confirm_key(&artifact)).unwrap();
        assert!(confirms_for(deps.as_ref().storage, &confirm_key(&artifact))
            .unwrap()
            .is_empty());
    }
}
