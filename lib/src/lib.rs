use cosmwasm_std::StdError;
use ethers_core::types::{SignatureError, H160};
use std::str::FromStr;

mod artifact;
pub use artifact::*;

mod claim;
pub use claim::*;

mod params;
pub use params::*;

mod token;
pub use token::*;

/// Denom prefix for vouchers minted against remote-origin assets.
/// `bridge0xdac17f…` is the home representation of ERC-20 `0xdac17f…`.
pub const VOUCHER_PREFIX: &str = "bridge";

/// Error types shared by the bridge crates
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Signature error passthrough
    #[error(transparent)]
    SignatureError(#[from] SignatureError),

    #[error("invalid remote address: {0}")]
    InvalidRemoteAddress(String),

    #[error("invalid bridge id: {0}")]
    InvalidBridgeId(String),
}

impl From<BridgeError> for StdError {
    fn from(err: BridgeError) -> StdError {
        StdError::generic_err(err.to_string())
    }
}

/// Parse a `0x`-prefixed, 20-byte hex remote address.
pub fn parse_remote_address(addr: &str) -> Result<H160, BridgeError> {
    if !addr.starts_with("0x") || addr.len() != 42 {
        return Err(BridgeError::InvalidRemoteAddress(addr.to_owned()));
    }
    H160::from_str(addr).map_err(|_| BridgeError::InvalidRemoteAddress(addr.to_owned()))
}

/// Voucher denom for a remote token contract.
pub fn voucher_denom(contract: &H160) -> String {
    format!("{}{:?}", VOUCHER_PREFIX, contract)
}

/// Inverse of [`voucher_denom`]. Returns `None` for non-voucher denoms.
pub fn voucher_contract(denom: &str) -> Option<H160> {
    denom
        .strip_prefix(VOUCHER_PREFIX)
        .and_then(|hex_addr| parse_remote_address(hex_addr).ok())
}

/// Digest a validator signs with its remote key to prove control of that
/// key when registering delegate keys.
pub fn delegate_keys_digest(validator: &str, delegate: &str) -> ethers_core::types::H256 {
    let mut preimage = Vec::new();
    preimage.extend_from_slice(b"delegateKeys");
    preimage.extend_from_slice(validator.as_bytes());
    preimage.extend_from_slice(delegate.as_bytes());
    ethers_core::types::H256::from(ethers_core::utils::keccak256(preimage))
}

/// Left-pad (or reject over-long) input into a 32-byte word. Used for the
/// bridge id and the checkpoint domain separants.
pub fn to_fixed_32(input: &[u8]) -> Result<[u8; 32], BridgeError> {
    if input.len() > 32 {
        return Err(BridgeError::InvalidBridgeId(
            String::from_utf8_lossy(input).into_owned(),
        ));
    }
    let mut buf = [0u8; 32];
    buf[32 - input.len()..].copy_from_slice(input);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_checksummed_and_lowercase_addresses() {
        let lower = parse_remote_address("0xd041c41ea1bf0f006adbb6d2c9ef9d425de5ead7").unwrap();
        let check = parse_remote_address("0xd041c41EA1bf0F006ADBb6d2c9ef9D425dE5eaD7").unwrap();
        assert_eq!(lower, check);

        assert!(parse_remote_address("d041c41ea1bf0f006adbb6d2c9ef9d425de5ead7").is_err());
        assert!(parse_remote_address("0xd041").is_err());
        assert!(parse_remote_address("0xzz41c41ea1bf0f006adbb6d2c9ef9d425de5ead7").is_err());
    }

    #[test]
    fn voucher_denom_round_trips() {
        let contract = parse_remote_address("0x429881672b9ae42b8eba0e26cd9c73711b891ca5").unwrap();
        let denom = voucher_denom(&contract);
        assert_eq!(denom, "bridge0x429881672b9ae42b8eba0e26cd9c73711b891ca5");
        assert_eq!(voucher_contract(&denom), Some(contract));
        assert_eq!(voucher_contract("uatom"), None);
    }

    #[test]
    fn fixed_32_pads_left() {
        let padded = to_fixed_32(b"bridge-test").unwrap();
        assert_eq!(&padded[32 - 11..], b"bridge-test");
        assert!(padded[..32 - 11].iter().all(|b| *b == 0));
        assert!(to_fixed_32(&[0u8; 33]).is_err());
    }
}
