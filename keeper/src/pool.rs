use cosmwasm_std::{Addr, Coin, Order, StdResult, Storage};

use lib::{voucher_contract, voucher_denom, Erc20Token, SendToRemote};

use crate::error::ContractError;
use crate::state::{
    fee_index_key, next_transfer_id, DENOM_TO_ERC20, ERC20_TO_DENOM, TRANSFERS, UNBATCHED,
};
use crate::traits::Bank;

/// Resolve a home denom to its remote token contract. Returns the contract
/// and whether the denom is a voucher (remote-origin asset).
pub fn contract_for_denom(
    storage: &dyn Storage,
    denom: &str,
) -> Result<(String, bool), ContractError> {
    if let Some(contract) = voucher_contract(denom) {
        return Ok((format!("{:?}", contract), true));
    }
    match DENOM_TO_ERC20.may_load(storage, denom.to_owned())? {
        Some(contract) => Ok((contract, false)),
        None => Err(ContractError::invalid(format!(
            "denom {} has no remote representation",
            denom
        ))),
    }
}

/// Resolve a remote token contract to its home denom. Home-origin tokens
/// come from the deployed-ERC-20 registry, everything else is a voucher.
pub fn denom_for_contract(storage: &dyn Storage, contract: &str) -> StdResult<(String, bool)> {
    match ERC20_TO_DENOM.may_load(storage, contract.to_owned())? {
        Some(denom) => Ok((denom, false)),
        None => {
            let parsed = lib::parse_remote_address(contract)?;
            Ok((voucher_denom(&parsed), true))
        }
    }
}

/// Insert a transfer under its id and under the fee availability index.
pub fn add_to_pool(
    storage: &mut dyn Storage,
    sender: Addr,
    destination: String,
    erc20_token: Erc20Token,
    erc20_fee: Erc20Token,
) -> Result<SendToRemote, ContractError> {
    if erc20_token.contract != erc20_fee.contract {
        return Err(ContractError::invalid(
            "transfer and fee must share one token contract",
        ));
    }

    let id = next_transfer_id(storage)?;
    let transfer = SendToRemote {
        id,
        sender,
        destination,
        erc20_token,
        erc20_fee,
    };

    TRANSFERS.save(storage, id, &transfer)?;
    UNBATCHED.save(storage, availability_key(&transfer), &cosmwasm_std::Empty {})?;
    Ok(transfer)
}

/// Remove the sender's own unbatched transfer and refund it.
pub fn cancel_send(
    storage: &mut dyn Storage,
    bank: &mut dyn Bank,
    sender: &Addr,
    id: u64,
) -> Result<(SendToRemote, Coin), ContractError> {
    let transfer = TRANSFERS
        .may_load(storage, id)?
        .ok_or(ContractError::Unknown { entity: "transfer" })?;
    if transfer.sender != *sender {
        return Err(ContractError::invalid("only the sender may cancel"));
    }
    if !UNBATCHED.has(storage, availability_key(&transfer)) {
        return Err(ContractError::invalid(
            "transfer already included in a batch",
        ));
    }

    UNBATCHED.remove(storage, availability_key(&transfer));
    TRANSFERS.remove(storage, id);

    let refund = refund_coin(storage, &transfer)?;
    let (_, is_voucher) = denom_for_contract(storage, &transfer.erc20_token.contract)?;
    if is_voucher {
        // burned on the way in; restore supply before paying out
        bank.mint(std::slice::from_ref(&refund))?;
    }
    bank.send_from_module(sender, std::slice::from_ref(&refund))?;

    Ok((transfer, refund))
}

/// Pool entries for one token, fee descending then id ascending.
pub fn unbatched_by_fee(
    storage: &dyn Storage,
    token_contract: &str,
) -> StdResult<Vec<SendToRemote>> {
    let ids: Vec<u64> = UNBATCHED
        .sub_prefix(token_contract.to_owned())
        .range(storage, None, None, Order::Ascending)
        .map(|item| item.map(|((_, id), _)| id))
        .collect::<StdResult<_>>()?;

    // a dangling index entry is corruption; TRANSFERS.load aborts on it
    ids.into_iter()
        .map(|id| TRANSFERS.load(storage, id))
        .collect()
}

/// Suspend a transfer: drop it from the availability index while its
/// primary record stays for the carrying batch's lifetime.
pub fn remove_available(storage: &mut dyn Storage, transfer: &SendToRemote) {
    UNBATCHED.remove(storage, availability_key(transfer));
}

/// Put a suspended transfer back up for batching. The original id is older
/// than anything that arrived since, so it sorts first in its fee bucket.
pub fn requeue(storage: &mut dyn Storage, transfer: &SendToRemote) -> StdResult<()> {
    UNBATCHED.save(storage, availability_key(transfer), &cosmwasm_std::Empty {})
}

/// Destroy a transfer entirely (batch executed).
pub fn destroy(storage: &mut dyn Storage, transfer: &SendToRemote) {
    UNBATCHED.remove(storage, availability_key(transfer));
    TRANSFERS.remove(storage, transfer.id);
}

pub fn refund_coin(storage: &dyn Storage, transfer: &SendToRemote) -> StdResult<Coin> {
    let (denom, _) = denom_for_contract(storage, &transfer.erc20_token.contract)?;
    Ok(Coin {
        denom,
        amount: transfer.erc20_token.amount + transfer.erc20_fee.amount,
    })
}

fn availability_key(transfer: &SendToRemote) -> (String, Vec<u8>, u64) {
    (
        transfer.erc20_token.contract.clone(),
        fee_index_key(transfer.erc20_fee.amount),
        transfer.id,
    )
}
