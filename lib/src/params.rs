use cosmwasm_std::{Decimal, StdError, StdResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::Erc20Token;

/// Governance parameters. Installed at instantiation, replaced wholesale
/// through sudo, validated before acceptance.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, JsonSchema)]
pub struct Params {
    /// Bridge-instance identifier mixed into every checkpoint. At most 32
    /// bytes; the remote contract holds the same value.
    pub bridge_id: String,
    /// Address of the bridge contract on the remote chain (event metadata).
    pub bridge_remote_address: String,
    /// Chain id of the remote chain (event metadata).
    pub bridge_chain_id: u64,
    /// Maximum transfers per batch.
    pub batch_tx_size: u64,
    /// Blocks a validator has to confirm a valset before being slashed.
    pub signed_valsets_window: u64,
    /// Blocks a validator has to confirm a batch before being slashed.
    pub signed_batches_window: u64,
    /// Blocks a validator has to claim an observed event before being slashed.
    pub signed_claims_window: u64,
    /// Target batch lifetime on the remote chain, in milliseconds.
    pub target_batch_timeout: u64,
    /// Average home block time in milliseconds.
    pub average_block_time: u64,
    /// Average remote block time in milliseconds.
    pub average_remote_block_time: u64,
    /// Normalized power drift that forces a new valset.
    pub significant_power_diff: Decimal,
    pub slash_fraction_valset: Decimal,
    pub slash_fraction_batch: Decimal,
    pub slash_fraction_claim: Decimal,
    pub slash_fraction_bad_remote_signature: Decimal,
    /// Optional incentive attached to each valset update.
    pub valset_reward: Option<Erc20Token>,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            bridge_id: "defaultbridgeid".to_owned(),
            bridge_remote_address: String::new(),
            bridge_chain_id: 1,
            batch_tx_size: 100,
            signed_valsets_window: 10_000,
            signed_batches_window: 10_000,
            signed_claims_window: 10_000,
            // 12 hours
            target_batch_timeout: 43_200_000,
            average_block_time: 5_000,
            average_remote_block_time: 15_000,
            significant_power_diff: Decimal::percent(5),
            slash_fraction_valset: Decimal::permille(1),
            slash_fraction_batch: Decimal::permille(1),
            slash_fraction_claim: Decimal::permille(1),
            slash_fraction_bad_remote_signature: Decimal::permille(1),
            valset_reward: None,
        }
    }
}

impl Params {
    pub fn validate(&self) -> StdResult<()> {
        if self.bridge_id.is_empty() || self.bridge_id.len() > 32 {
            return Err(StdError::generic_err("bridge id must be 1..=32 bytes"));
        }
        if self.batch_tx_size == 0 {
            return Err(StdError::generic_err("batch size must be positive"));
        }
        if self.average_block_time == 0 || self.average_remote_block_time == 0 {
            return Err(StdError::generic_err("average block times must be positive"));
        }
        if self.target_batch_timeout < self.average_remote_block_time {
            return Err(StdError::generic_err(
                "batch timeout shorter than one remote block",
            ));
        }
        for fraction in [
            self.slash_fraction_valset,
            self.slash_fraction_batch,
            self.slash_fraction_claim,
            self.slash_fraction_bad_remote_signature,
        ]
        .iter()
        {
            if *fraction > Decimal::one() {
                return Err(StdError::generic_err("slash fraction above one"));
            }
        }
        if self.significant_power_diff > Decimal::one() {
            return Err(StdError::generic_err("power diff threshold above one"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_validate() {
        Params::default().validate().unwrap();
    }

    #[test]
    fn rejects_degenerate_params() {
        let mut params = Params::default();
        params.average_remote_block_time = 0;
        assert!(params.validate().is_err());

        let mut params = Params::default();
        params.bridge_id = "x".repeat(33);
        assert!(params.validate().is_err());

        let mut params = Params::default();
        params.slash_fraction_batch = Decimal::percent(150);
        assert!(params.validate().is_err());
    }
}
