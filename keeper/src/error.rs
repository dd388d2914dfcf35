use cosmwasm_std::{StdError, Uint128};
use lib::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContractError {
    #[error("{0}")]
    Std(#[from] StdError),

    #[error("{0}")]
    Bridge(#[from] BridgeError),

    #[error("invalid: {reason}")]
    Invalid { reason: String },

    #[error("unknown {entity}")]
    Unknown { entity: &'static str },

    #[error("duplicate {what}")]
    Duplicate { what: &'static str },

    #[error("non-contiguous event nonce: expected {expected}, got {got}")]
    NonContiguousEventNonce { expected: u64, got: u64 },

    #[error("new batch would not be more profitable: in-flight batch carries {in_flight}")]
    NotMoreProfitable { in_flight: Uint128 },

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("checkpoint exists, cannot slash")]
    CheckpointExists,

    #[error("signature recovery failed")]
    SignatureRecoveryFailed,

    #[error("timeout {timeout} already passed: last observed remote height {remote_height}")]
    TimeoutPassed { timeout: u64, remote_height: u64 },
}

impl ContractError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        ContractError::Invalid {
            reason: reason.into(),
        }
    }
}
