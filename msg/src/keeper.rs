use cosmwasm_std::{Binary, Coin};
use serde::{Deserialize, Serialize};

use lib::{
    Artifact, Attestation, BatchTx, Claim, Confirmation, ContractCallTx, Params, SendToRemote,
    ValsetUpdate,
};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InstantiateMsg {
    pub params: Params,
}

/// Identity of a checkpoint-bearing artifact, as carried by confirmation
/// submissions and queries.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactId {
    Batch {
        token_contract: String,
        batch_nonce: u64,
    },
    Valset {
        nonce: u64,
    },
    ContractCall {
        invalidation_scope: Binary,
        invalidation_nonce: u64,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteMsg {
    /// Debit the sender and enqueue an outbound transfer
    SendToRemote {
        destination: String,
        amount: Coin,
        fee: Coin,
    },
    /// Build a fee-optimized batch for one token contract
    RequestBatch { token: String },
    /// Remove the sender's own unbatched transfer and refund it
    CancelSendToRemote { id: u64 },
    /// Record a validator signature over an artifact's checkpoint
    SubmitConfirm {
        artifact: ArtifactId,
        remote_address: String,
        signature: Binary,
    },
    /// Attest that a remote-chain event occurred
    SubmitClaim { claim: Claim },
    /// Accuse a validator of signing a checkpoint the keeper never produced
    SubmitBadSignatureEvidence { subject: Artifact, signature: Binary },
    /// Register the sender validator's delegate and remote signing keys
    SetDelegateKeys {
        delegate: String,
        remote_address: String,
        proof: Binary,
    },
}

/// Host-privileged entry points: the end-block hook and governance.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum SudoMsg {
    EndBlock {},
    UpdateParams { params: Params },
    /// Store an arbitrary signed remote invocation on behalf of another
    /// home-chain module
    ScheduleContractCall { call: ContractCallTx },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum QueryMsg {
    Params {},
    /// A batch by token contract and nonce
    BatchTx { token: String, nonce: u64 },
    /// The highest-nonce live batch for a token contract
    LastBatchByToken { token: String },
    /// All live batches
    BatchTxs {},
    Valset { nonce: u64 },
    LatestValset {},
    /// Pool entries for a token, fee descending
    UnbatchedTransfers { token: String },
    ContractCall {
        invalidation_scope: Binary,
        invalidation_nonce: u64,
    },
    /// All confirmations recorded for one artifact
    Confirms { artifact: ArtifactId },
    Attestation { event_nonce: u64, claim_hash: Binary },
    DelegateKeys { validator: String },
    LastEventNonceByValidator { validator: String },
    LastObservedNonces {},
    LastObservedHeights {},
    DenomToErc20 { denom: String },
    Erc20ToDenom { contract: String },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ParamsResponse {
    pub params: Params,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BatchTxResponse {
    pub batch: Option<BatchTx>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct BatchTxsResponse {
    pub batches: Vec<BatchTx>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ValsetResponse {
    pub valset: Option<ValsetUpdate>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct UnbatchedTransfersResponse {
    /// Fee descending, id ascending
    pub transfers: Vec<SendToRemote>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ContractCallResponse {
    pub call: Option<ContractCallTx>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConfirmsResponse {
    pub confirms: Vec<Confirmation>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct AttestationResponse {
    pub attestation: Option<Attestation>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DelegateKeysResponse {
    pub delegate: Option<String>,
    pub remote_address: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LastEventNonceResponse {
    pub event_nonce: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LastObservedNoncesResponse {
    pub event_nonce: u64,
    pub valset_nonce: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct LastObservedHeightsResponse {
    pub home_height: u64,
    pub remote_height: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DenomToErc20Response {
    pub contract: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Erc20ToDenomResponse {
    pub denom: Option<String>,
}
