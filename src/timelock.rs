//! # Timelock Codec
//!
//! Binds plaintext blocks to future beacon rounds. Encryption maps an
//! unlock time onto the beacon's round schedule and encrypts against that
//! round's identity; once the beacon publishes the round signature, anyone
//! holding the ciphertext can derive the unlock key the ledger verifier
//! expects. No local decryption is performed here: decryption authority is
//! delegated to the external verifier.

use crate::beacon::{ChainInfo, RoundSignature};
use crate::error::{WalletError, WalletResult};
use crate::ibe::{self, Ciphertext};
use ark_bls12_381::G1Affine;
use sha2::{Digest, Sha256};

/// Beacon round whose signature becomes available at or after
/// `unlock_time`: `ceil((unlock_time - genesis) / period)`, clamped to
/// round 1 for times at or before chain genesis.
pub fn round_for(chain: &ChainInfo, unlock_time: u64) -> u64 {
    if unlock_time <= chain.genesis_time {
        return 1;
    }
    let elapsed = unlock_time - chain.genesis_time;
    elapsed.div_ceil(chain.period).max(1)
}

/// IBE identity for a beacon round: `sha256(round_be_bytes)`
pub fn round_identity(round: u64) -> [u8; 32] {
    Sha256::digest(round.to_be_bytes()).into()
}

/// Encrypts blocks for future rounds and derives unlock keys from
/// published round signatures, for one beacon chain.
#[derive(Debug, Clone)]
pub struct TimelockCodec {
    chain: ChainInfo,
    public_key: G1Affine,
}

impl TimelockCodec {
    /// Create a codec for a beacon chain, decoding its public key
    pub fn new(chain: ChainInfo) -> WalletResult<Self> {
        if chain.period == 0 {
            return Err(WalletError::clock("beacon chain period must be positive"));
        }
        let public_key = ibe::decode_public_key(&chain.public_key)?;
        Ok(Self { chain, public_key })
    }

    /// The chain this codec encrypts against
    pub fn chain(&self) -> &ChainInfo {
        &self.chain
    }

    /// Beacon round covering `unlock_time` on this chain
    pub fn round_for(&self, unlock_time: u64) -> u64 {
        round_for(&self.chain, unlock_time)
    }

    /// Encrypt secret proof material so it can only be unlocked once the
    /// round covering `unlock_time` has been signed by the beacon.
    /// The material is zero-padded to the fixed plaintext block first.
    pub fn encrypt(&self, material: &[u8], unlock_time: u64) -> WalletResult<Ciphertext> {
        let round = self.round_for(unlock_time);
        let identity = round_identity(round);
        let block = ibe::pad_block(material)?;
        ibe::encrypt(&self.public_key, &identity, &block)
    }

    /// Derive the unlock key `e(U, signature)` for a ciphertext from the
    /// beacon signature of its round. Deterministic in its inputs.
    pub fn derive_unlock_key(
        &self,
        ciphertext: &Ciphertext,
        round_signature: &RoundSignature,
    ) -> WalletResult<Vec<u8>> {
        let signature = ibe::decode_signature(&round_signature.signature)?;
        ibe::unlock_pairing(ciphertext, &signature)
    }
}
