use cosmwasm_std::{Addr, Coin, Decimal, StdResult};

/// A bonded validator as seen by the host staking module.
#[derive(Clone, Debug, PartialEq)]
pub struct StakedValidator {
    pub operator: Addr,
    /// Raw consensus power. Never signed as-is; normalized first.
    pub power: u64,
    pub jailed: bool,
    /// Home block height at which the validator entered the bonded set.
    pub bonded_height: u64,
}

/// Host staking module, as consumed by the keeper.
pub trait Staking {
    /// Currently bonded, unjailed validators in a deterministic order.
    fn bonded_validators(&self) -> Vec<StakedValidator>;

    fn validator(&self, operator: &Addr) -> Option<StakedValidator>;

    fn total_bonded_power(&self) -> u64 {
        self.bonded_validators().iter().map(|v| v.power).sum()
    }

    fn slash(&mut self, operator: &Addr, infraction_height: u64, power: u64, fraction: Decimal);

    fn jail(&mut self, operator: &Addr);

    /// Home height at which the most recent unbonding began; zero if none.
    fn last_unbonding_height(&self) -> u64;
}

/// Host bank module, scoped to the bridge module account.
pub trait Bank {
    /// Mint into the module account.
    fn mint(&mut self, coins: &[Coin]) -> StdResult<()>;

    /// Burn out of the module account.
    fn burn(&mut self, coins: &[Coin]) -> StdResult<()>;

    fn send_to_module(&mut self, from: &Addr, coins: &[Coin]) -> StdResult<()>;

    fn send_from_module(&mut self, to: &Addr, coins: &[Coin]) -> StdResult<()>;

    fn has_balance(&self, addr: &Addr, coin: &Coin) -> bool;
}

/// The collaborators the host hands the keeper for the duration of one
/// delivered message or end-block hook.
pub struct Externals<'a> {
    pub bank: &'a mut dyn Bank,
    pub staking: &'a mut dyn Staking,
}
