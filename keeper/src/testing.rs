//! Deterministic mock collaborators for keeper tests.

use cosmwasm_std::{Addr, Coin, Decimal, StdError, StdResult, Storage};
use std::collections::BTreeMap;

use lib::Params;

use crate::state::{
    DELEGATE_BY_VALIDATOR, PARAMS, REMOTE_BY_VALIDATOR, VALIDATOR_BY_DELEGATE, VALIDATOR_BY_REMOTE,
};
use crate::traits::{Bank, StakedValidator, Staking};

pub const TOKEN: &str = "0x429881672b9ae42b8eba0e26cd9c73711b891ca5";
pub const DEST: &str = "0xd041c41ea1bf0f006adbb6d2c9ef9d425de5ead7";

pub const PRIVKEY_1: &str = "1111111111111111111111111111111111111111111111111111111111111111";
pub const PRIVKEY_2: &str = "2222222222222222222222222222222222222222222222222222222222222222";
pub const PRIVKEY_3: &str = "3333333333333333333333333333333333333333333333333333333333333333";
pub const PRIVKEY_4: &str = "4444444444444444444444444444444444444444444444444444444444444444";
pub const PRIVKEY_5: &str = "5555555555555555555555555555555555555555555555555555555555555555";

pub fn test_params() -> Params {
    Params {
        bridge_id: "bridge-test".to_owned(),
        bridge_remote_address: "0x8858eeb3dfffa017d4bce9801d340d36cf895ccf".to_owned(),
        bridge_chain_id: 5,
        target_batch_timeout: 3_600_000,
        ..Params::default()
    }
}

pub fn store_test_params(storage: &mut dyn Storage) {
    PARAMS.save(storage, &test_params()).unwrap();
}

/// Wire all four delegate-key maps for one validator.
pub fn register_keys(
    storage: &mut dyn Storage,
    validator: &Addr,
    delegate: &Addr,
    remote_address: &str,
) {
    DELEGATE_BY_VALIDATOR
        .save(storage, validator.clone(), delegate)
        .unwrap();
    VALIDATOR_BY_DELEGATE
        .save(storage, delegate.clone(), validator)
        .unwrap();
    REMOTE_BY_VALIDATOR
        .save(storage, validator.clone(), &remote_address.to_owned())
        .unwrap();
    VALIDATOR_BY_REMOTE
        .save(storage, remote_address.to_owned(), validator)
        .unwrap();
}

/// Params plus five equal-power validators with registered keys.
pub fn five_val_setup(storage: &mut dyn Storage) -> (MockBank, MockStaking) {
    store_test_params(storage);
    let mut staking = MockStaking::new();
    for i in 1..=5u64 {
        let validator = Addr::unchecked(format!("validator{}", i));
        staking.add_validator(&validator, 100, 0);
        register_keys(
            storage,
            &validator,
            &validator,
            &format!("0x{:040x}", 0xa0 + i),
        );
    }
    (MockBank::new(), staking)
}

#[derive(Default, Debug)]
pub struct MockBank {
    balances: BTreeMap<String, BTreeMap<String, u128>>,
    module: BTreeMap<String, u128>,
    pub minted: Vec<Coin>,
    pub burned: Vec<Coin>,
}

impl MockBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&mut self, addr: &Addr, denom: &str, amount: u128) {
        self.balances
            .entry(addr.to_string())
            .or_default()
            .insert(denom.to_owned(), amount);
    }

    pub fn set_module_balance(&mut self, denom: &str, amount: u128) {
        self.module.insert(denom.to_owned(), amount);
    }

    pub fn balance_of(&self, addr: &Addr, denom: &str) -> u128 {
        self.balances
            .get(addr.as_str())
            .and_then(|coins| coins.get(denom))
            .copied()
            .unwrap_or_default()
    }

    pub fn module_balance(&self, denom: &str) -> u128 {
        self.module.get(denom).copied().unwrap_or_default()
    }

    fn debit(
        entry: &mut BTreeMap<String, u128>,
        denom: &str,
        amount: u128,
    ) -> StdResult<()> {
        let balance = entry.entry(denom.to_owned()).or_default();
        if *balance < amount {
            return Err(StdError::generic_err("insufficient funds"));
        }
        *balance -= amount;
        Ok(())
    }
}

impl Bank for MockBank {
    fn mint(&mut self, coins: &[Coin]) -> StdResult<()> {
        for coin in coins {
            *self.module.entry(coin.denom.clone()).or_default() += coin.amount.u128();
            self.minted.push(coin.clone());
        }
        Ok(())
    }

    fn burn(&mut self, coins: &[Coin]) -> StdResult<()> {
        for coin in coins {
            Self::debit(&mut self.module, &coin.denom, coin.amount.u128())?;
            self.burned.push(coin.clone());
        }
        Ok(())
    }

    fn send_to_module(&mut self, from: &Addr, coins: &[Coin]) -> StdResult<()> {
        for coin in coins {
            let entry = self.balances.entry(from.to_string()).or_default();
            Self::debit(entry, &coin.denom, coin.amount.u128())?;
            *self.module.entry(coin.denom.clone()).or_default() += coin.amount.u128();
        }
        Ok(())
    }

    fn send_from_module(&mut self, to: &Addr, coins: &[Coin]) -> StdResult<()> {
        for coin in coins {
            Self::debit(&mut self.module, &coin.denom, coin.amount.u128())?;
            *self
                .balances
                .entry(to.to_string())
                .or_default()
                .entry(coin.denom.clone())
                .or_default() += coin.amount.u128();
        }
        Ok(())
    }

    fn has_balance(&self, addr: &Addr, coin: &Coin) -> bool {
        self.balance_of(addr, &coin.denom) >= coin.amount.u128()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlashRecord {
    pub operator: Addr,
    pub infraction_height: u64,
    pub power: u64,
    pub fraction: Decimal,
}

#[derive(Default, Debug)]
pub struct MockStaking {
    pub validators: Vec<StakedValidator>,
    pub slashes: Vec<SlashRecord>,
    pub last_unbonding_height: u64,
}

impl MockStaking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_validator(&mut self, operator: &Addr, power: u64, bonded_height: u64) {
        self.validators.push(StakedValidator {
            operator: operator.clone(),
            power,
            jailed: false,
            bonded_height,
        });
    }

    pub fn set_power(&mut self, operator: &Addr, power: u64) {
        if let Some(validator) = self
            .validators
            .iter_mut()
            .find(|v| v.operator == *operator)
        {
            validator.power = power;
        }
    }

    pub fn is_jailed(&self, operator: &Addr) -> bool {
        self.validators
            .iter()
            .any(|v| v.operator == *operator && v.jailed)
    }

    pub fn slashes_of(&self, operator: &Addr) -> Vec<SlashRecord> {
        self.slashes
            .iter()
            .filter(|record| record.operator == *operator)
            .cloned()
            .collect()
    }
}

impl Staking for MockStaking {
    fn bonded_validators(&self) -> Vec<StakedValidator> {
        self.validators
            .iter()
            .filter(|v| !v.jailed)
            .cloned()
            .collect()
    }

    fn validator(&self, operator: &Addr) -> Option<StakedValidator> {
        self.validators
            .iter()
            .find(|v| v.operator == *operator)
            .cloned()
    }

    fn slash(&mut self, operator: &Addr, infraction_height: u64, power: u64, fraction: Decimal) {
        self.slashes.push(SlashRecord {
            operator: operator.clone(),
            infraction_height,
            power,
            fraction,
        });
    }

    fn jail(&mut self, operator: &Addr) {
        if let Some(validator) = self
            .validators
            .iter_mut()
            .find(|v| v.operator == *operator)
        {
            validator.jailed = true;
        }
    }

    fn last_unbonding_height(&self) -> u64 {
        self.last_unbonding_height
    }
}
