use cosmwasm_std::{
    to_binary, Binary, Coin, Deps, DepsMut, Env, Event, MessageInfo, Response, StdResult,
};
use cw2::set_contract_version;
use ethers_core::types::{RecoveryMessage, Signature};
use std::convert::TryFrom;

use lib::{delegate_keys_digest, parse_remote_address, Claim, Erc20Token};
use msg::keeper::{
    ArtifactId, AttestationResponse, BatchTxResponse, BatchTxsResponse, ConfirmsResponse,
    ContractCallResponse, DelegateKeysResponse, DenomToErc20Response, Erc20ToDenomResponse,
    ExecuteMsg, InstantiateMsg, LastEventNonceResponse, LastObservedHeightsResponse,
    LastObservedNoncesResponse, ParamsResponse, QueryMsg, SudoMsg, UnbatchedTransfersResponse,
    ValsetResponse,
};

use crate::attestation;
use crate::batch;
use crate::confirm;
use crate::contract_call;
use crate::end_block;
use crate::error::ContractError;
use crate::evidence;
use crate::pool;
use crate::state::{
    observed_heights, ATTESTATIONS, DELEGATE_BY_VALIDATOR, LAST_OBSERVED_EVENT_NONCE,
    LAST_OBSERVED_VALSET_NONCE, PARAMS, REMOTE_BY_VALIDATOR, VALIDATOR_BY_DELEGATE,
    VALIDATOR_BY_REMOTE, VALSETS,
};
use crate::traits::Externals;
use crate::valset;

// version info for migration info
const CONTRACT_NAME: &str = "crates.io:bridge-keeper";
const CONTRACT_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn instantiate(
    deps: DepsMut,
    _env: Env,
    _info: MessageInfo,
    msg: InstantiateMsg,
) -> Result<Response, ContractError> {
    msg.params.validate()?;
    set_contract_version(deps.storage, CONTRACT_NAME, CONTRACT_VERSION)?;
    PARAMS.save(deps.storage, &msg.params)?;

    Ok(Response::new()
        .add_attribute("method", "instantiate")
        .add_attribute("bridge_id", msg.params.bridge_id))
}

pub fn execute(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    ext: &mut Externals,
    msg: ExecuteMsg,
) -> Result<Response, ContractError> {
    match msg {
        ExecuteMsg::SendToRemote {
            destination,
            amount,
            fee,
        } => try_send_to_remote(deps, info, ext, destination, amount, fee),
        ExecuteMsg::RequestBatch { token } => try_request_batch(deps, env, token),
        ExecuteMsg::CancelSendToRemote { id } => try_cancel_send_to_remote(deps, info, ext, id),
        ExecuteMsg::SubmitConfirm {
            artifact,
            remote_address,
            signature,
        } => try_submit_confirm(deps, info, artifact, remote_address, signature),
        ExecuteMsg::SubmitClaim { claim } => try_submit_claim(deps, env, info, ext, claim),
        ExecuteMsg::SubmitBadSignatureEvidence { subject, signature } => {
            let event = evidence::check_bad_signature_evidence(
                deps.storage,
                &env,
                ext.staking,
                &subject,
                signature.as_slice(),
            )?;
            Ok(Response::new().add_event(event))
        }
        ExecuteMsg::SetDelegateKeys {
            delegate,
            remote_address,
            proof,
        } => try_set_delegate_keys(deps, info, delegate, remote_address, proof),
    }
}

pub fn sudo(
    deps: DepsMut,
    env: Env,
    ext: &mut Externals,
    msg: SudoMsg,
) -> Result<Response, ContractError> {
    match msg {
        SudoMsg::EndBlock {} => end_block::end_block(deps, &env, ext),
        SudoMsg::UpdateParams { params } => {
            params.validate()?;
            PARAMS.save(deps.storage, &params)?;
            Ok(Response::new().add_attribute("method", "update_params"))
        }
        SudoMsg::ScheduleContractCall { call } => {
            let event = contract_call::schedule_call(deps.storage, &env, call)?;
            Ok(Response::new().add_event(event))
        }
    }
}

pub fn try_send_to_remote(
    deps: DepsMut,
    info: MessageInfo,
    ext: &mut Externals,
    destination: String,
    amount: Coin,
    fee: Coin,
) -> Result<Response, ContractError> {
    let destination = format!("{:?}", parse_remote_address(&destination)?);
    if amount.denom != fee.denom {
        return Err(ContractError::invalid("fee must match the sent denom"));
    }
    if amount.amount.is_zero() {
        return Err(ContractError::invalid("cannot send a zero amount"));
    }

    let (contract, is_voucher) = pool::contract_for_denom(deps.storage, &amount.denom)?;
    let total = Coin {
        denom: amount.denom.clone(),
        amount: amount.amount + fee.amount,
    };
    if !ext.bank.has_balance(&info.sender, &total) {
        return Err(ContractError::InsufficientBalance);
    }
    ext.bank
        .send_to_module(&info.sender, std::slice::from_ref(&total))?;
    if is_voucher {
        // vouchers leave home supply until the mirrored deposit comes back
        ext.bank.burn(std::slice::from_ref(&total))?;
    }

    let transfer = pool::add_to_pool(
        deps.storage,
        info.sender.clone(),
        destination.clone(),
        Erc20Token::new(contract.clone(), amount.amount),
        Erc20Token::new(contract.clone(), fee.amount),
    )?;

    Ok(Response::new().add_event(
        Event::new("SendToRemote")
            .add_attribute("transfer_id", transfer.id.to_string())
            .add_attribute("sender", info.sender.as_str())
            .add_attribute("destination", destination)
            .add_attribute("token_contract", contract)
            .add_attribute("amount", amount.amount.to_string())
            .add_attribute("fee", fee.amount.to_string()),
    ))
}

pub fn try_request_batch(
    deps: DepsMut,
    env: Env,
    token: String,
) -> Result<Response, ContractError> {
    let token = format!("{:?}", parse_remote_address(&token)?);
    let max_elements = PARAMS.load(deps.storage)?.batch_tx_size;
    let (_, event) = batch::build_batch(deps.storage, &env, &token, max_elements)?;
    Ok(Response::new().add_event(event))
}

pub fn try_cancel_send_to_remote(
    deps: DepsMut,
    info: MessageInfo,
    ext: &mut Externals,
    id: u64,
) -> Result<Response, ContractError> {
    let (transfer, refund) = pool::cancel_send(deps.storage, ext.bank, &info.sender, id)?;
    Ok(Response::new().add_event(
        Event::new("SendCancelled")
            .add_attribute("transfer_id", transfer.id.to_string())
            .add_attribute("sender", info.sender.as_str())
            .add_attribute("refund", refund.to_string()),
    ))
}

pub fn try_submit_confirm(
    deps: DepsMut,
    info: MessageInfo,
    artifact: ArtifactId,
    remote_address: String,
    signature: Binary,
) -> Result<Response, ContractError> {
    let event = confirm::submit_confirm(
        deps.storage,
        &info.sender,
        &artifact,
        &remote_address,
        signature.as_slice(),
    )?;
    Ok(Response::new().add_event(event))
}

pub fn try_submit_claim(
    deps: DepsMut,
    env: Env,
    info: MessageInfo,
    ext: &mut Externals,
    claim: Claim,
) -> Result<Response, ContractError> {
    let events = attestation::submit_claim(
        deps.api,
        deps.storage,
        &env,
        ext.bank,
        ext.staking,
        &info.sender,
        claim,
    )?;
    Ok(Response::new().add_events(events))
}

/// Register the signing keys a validator acts through: the home delegate
/// that signs confirm/claim messages and the remote secp256k1 address the
/// remote contract checks signatures against. The proof demonstrates
/// control of the remote key.
pub fn try_set_delegate_keys(
    deps: DepsMut,
    info: MessageInfo,
    delegate: String,
    remote_address: String,
    proof: Binary,
) -> Result<Response, ContractError> {
    let validator = info.sender;
    let delegate = deps.api.addr_validate(&delegate)?;
    let remote = parse_remote_address(&remote_address)?;
    let remote_address = format!("{:?}", remote);

    if let Some(owner) = VALIDATOR_BY_REMOTE.may_load(deps.storage, remote_address.clone())? {
        if owner != validator {
            return Err(ContractError::invalid(
                "remote address already bound to another validator",
            ));
        }
    }
    if let Some(owner) = VALIDATOR_BY_DELEGATE.may_load(deps.storage, delegate.clone())? {
        if owner != validator {
            return Err(ContractError::invalid(
                "delegate already bound to another validator",
            ));
        }
    }

    let sig =
        Signature::try_from(proof.as_slice()).map_err(|_| ContractError::SignatureRecoveryFailed)?;
    let digest = delegate_keys_digest(validator.as_str(), delegate.as_str());
    let recovered = sig
        .recover(RecoveryMessage::Hash(digest))
        .map_err(|_| ContractError::SignatureRecoveryFailed)?;
    if recovered != remote {
        return Err(ContractError::invalid(
            "proof does not recover to the remote address",
        ));
    }

    // rotating keys drops the previous reverse bindings
    if let Some(old_remote) = REMOTE_BY_VALIDATOR.may_load(deps.storage, validator.clone())? {
        VALIDATOR_BY_REMOTE.remove(deps.storage, old_remote);
    }
    if let Some(old_delegate) = DELEGATE_BY_VALIDATOR.may_load(deps.storage, validator.clone())? {
        VALIDATOR_BY_DELEGATE.remove(deps.storage, old_delegate);
    }

    DELEGATE_BY_VALIDATOR.save(deps.storage, validator.clone(), &delegate)?;
    VALIDATOR_BY_DELEGATE.save(deps.storage, delegate.clone(), &validator)?;
    REMOTE_BY_VALIDATOR.save(deps.storage, validator.clone(), &remote_address)?;
    VALIDATOR_BY_REMOTE.save(deps.storage, remote_address.clone(), &validator)?;

    Ok(Response::new().add_event(
        Event::new("DelegateKeysSet")
            .add_attribute("validator", validator.as_str())
            .add_attribute("delegate", delegate.as_str())
            .add_attribute("remote_address", remote_address),
    ))
}

pub fn query(deps: Deps, _env: Env, msg: QueryMsg) -> StdResult<Binary> {
    match msg {
        QueryMsg::Params {} => to_binary(&ParamsResponse {
            params: PARAMS.load(deps.storage)?,
        }),
        QueryMsg::BatchTx { token, nonce } => {
            let token = format!("{:?}", parse_remote_address(&token)?);
            to_binary(&BatchTxResponse {
                batch: batch::get_batch(deps.storage, &token, nonce)?,
            })
        }
        QueryMsg::LastBatchByToken { token } => {
            let token = format!("{:?}", parse_remote_address(&token)?);
            to_binary(&BatchTxResponse {
                batch: batch::last_batch_by_token(deps.storage, &token)?,
            })
        }
        QueryMsg::BatchTxs {} => to_binary(&BatchTxsResponse {
            batches: batch::all_batches(deps.storage)?,
        }),
        QueryMsg::Valset { nonce } => to_binary(&ValsetResponse {
            valset: VALSETS.may_load(deps.storage, nonce)?,
        }),
        QueryMsg::LatestValset {} => to_binary(&ValsetResponse {
            valset: valset::latest_valset(deps.storage)?,
        }),
        QueryMsg::UnbatchedTransfers { token } => {
            let token = format!("{:?}", parse_remote_address(&token)?);
            to_binary(&UnbatchedTransfersResponse {
                transfers: pool::unbatched_by_fee(deps.storage, &token)?,
            })
        }
        QueryMsg::ContractCall {
            invalidation_scope,
            invalidation_nonce,
        } => to_binary(&ContractCallResponse {
            call: contract_call::get_call(
                deps.storage,
                invalidation_scope.as_slice(),
                invalidation_nonce,
            )?,
        }),
        QueryMsg::Confirms { artifact } => to_binary(&ConfirmsResponse {
            confirms: confirm::confirms_for(deps.storage, &confirm::confirm_key(&artifact))?,
        }),
        QueryMsg::Attestation {
            event_nonce,
            claim_hash,
        } => to_binary(&AttestationResponse {
            attestation: ATTESTATIONS
                .may_load(deps.storage, (event_nonce, claim_hash.to_vec()))?,
        }),
        QueryMsg::DelegateKeys { validator } => {
            let validator = deps.api.addr_validate(&validator)?;
            to_binary(&DelegateKeysResponse {
                delegate: DELEGATE_BY_VALIDATOR
                    .may_load(deps.storage, validator.clone())?
                    .map(|addr| addr.into_string()),
                remote_address: REMOTE_BY_VALIDATOR.may_load(deps.storage, validator)?,
            })
        }
        QueryMsg::LastEventNonceByValidator { validator } => {
            let validator = deps.api.addr_validate(&validator)?;
            to_binary(&LastEventNonceResponse {
                event_nonce: attestation::last_event_nonce_for(deps.storage, &validator)?,
            })
        }
        QueryMsg::LastObservedNonces {} => to_binary(&LastObservedNoncesResponse {
            event_nonce: LAST_OBSERVED_EVENT_NONCE
                .may_load(deps.storage)?
                .unwrap_or_default(),
            valset_nonce: LAST_OBSERVED_VALSET_NONCE
                .may_load(deps.storage)?
                .unwrap_or_default(),
        }),
        QueryMsg::LastObservedHeights {} => {
            let heights = observed_heights(deps.storage)?;
            to_binary(&LastObservedHeightsResponse {
                home_height: heights.home_height,
                remote_height: heights.remote_height,
            })
        }
        QueryMsg::DenomToErc20 { denom } => to_binary(&DenomToErc20Response {
            contract: pool::contract_for_denom(deps.storage, &denom)
                .ok()
                .map(|(contract, _)| contract),
        }),
        QueryMsg::Erc20ToDenom { contract } => to_binary(&Erc20ToDenomResponse {
            denom: pool::denom_for_contract(deps.storage, &contract)
                .ok()
                .map(|(denom, _)| denom),
        }),
    }
}
