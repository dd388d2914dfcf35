use ethers_core::types::{Address, Signature, H256};
use ethers_signers::{LocalWallet, Signer};

/// A validator's remote signing key for tests. Signs raw 32-byte digests,
/// matching what the keeper recovers against.
#[derive(Debug, Clone)]
pub struct RemoteSigner {
    pub wallet: LocalWallet,
    pub address: Address,
}

impl RemoteSigner {
    pub fn from_privkey(privkey: &str) -> Self {
        let wallet: LocalWallet = privkey.parse().unwrap();
        Self::from_wallet(wallet)
    }

    pub fn from_wallet(wallet: LocalWallet) -> Self {
        Self {
            address: wallet.address(),
            wallet,
        }
    }

    /// `0x`-prefixed lowercase hex address, the format the keeper stores.
    pub fn address_string(&self) -> String {
        format!("{:?}", self.address)
    }

    pub fn sign_digest(&self, digest: H256) -> Signature {
        self.wallet.sign_hash(digest)
    }

    /// Signature bytes in the 65-byte r‖s‖v wire form carried by messages.
    pub fn sign_digest_bytes(&self, digest: H256) -> Vec<u8> {
        self.sign_digest(digest).to_vec()
    }
}
