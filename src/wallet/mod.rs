//! # Wallet Coordinators
//!
//! The commit-reveal coordinators for the two wallet variants, plus the
//! persisted wallet record they share.
//!
//! ## Variants
//!
//! - **Password wallet**: one shared secret, one timelocked ciphertext,
//!   one fixed expiration.
//! - **OTP wallet**: rotating one-time tokens, pre-encrypted per rotation
//!   and committed under a Merkle root.
//!
//! Both drive the same protocol against the ledger: validate timing
//! locally, submit the hidden commitment with collateral, sleep out the
//! window, then assemble and submit the unlock material. One spend attempt
//! is in flight per coordinator at a time.

pub mod otp;
pub mod password;

pub use otp::{OtpParams, OtpWallet};
pub use password::PasswordWallet;

use crate::clock;
use crate::error::{WalletError, WalletResult};
use crate::ibe::Ciphertext;
use crate::ledger::TxReceipt;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Variant-specific wallet parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum WalletParams {
    Password {
        /// Fixed Unix timestamp after which the wallet can be spent
        expiration: u64,
        /// Collateral escrowed per commitment
        collateral: u64,
    },
    Otp {
        /// Digits per derived token
        token_digits: u32,
        /// Seconds per rotation window
        rotation_interval: u64,
        /// Number of pre-encrypted rotations
        rotations: u32,
        /// Collateral escrowed per commitment
        collateral: u64,
    },
}

/// Secret material at rest in the wallet record.
///
/// The passphrase-encrypted form is an at-rest protection hook: a record
/// holding it must be decrypted out-of-band before a coordinator can use
/// the seed or password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "form", rename_all = "snake_case")]
pub enum SecretMaterial {
    Plaintext {
        #[serde(with = "hex")]
        bytes: Vec<u8>,
    },
    PassphraseEncrypted {
        #[serde(with = "hex")]
        bytes: Vec<u8>,
    },
}

impl SecretMaterial {
    /// The usable secret bytes, or an error if still passphrase-encrypted
    pub fn plaintext(&self) -> WalletResult<&[u8]> {
        match self {
            SecretMaterial::Plaintext { bytes } => Ok(bytes),
            SecretMaterial::PassphraseEncrypted { .. } => Err(WalletError::state(
                "wallet secret is passphrase-encrypted; decrypt it before use",
            )),
        }
    }
}

/// Persisted, off-ledger wallet record. Immutable value passed into and
/// returned from coordinator operations; load/save are plain
/// serialize/deserialize calls at the boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRecord {
    pub params: WalletParams,
    /// Ledger contract address
    pub address: String,
    /// Wallet genesis, whole Unix seconds
    pub genesis: u64,
    /// Raw OTP seed or password
    pub secret: SecretMaterial,
    /// The single timelocked ciphertext (password variant only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ciphertext: Option<Ciphertext>,
}

impl WalletRecord {
    /// Persist the record as pretty-printed JSON
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> WalletResult<()> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a persisted record
    pub fn load_from_file(path: impl AsRef<Path>) -> WalletResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Coordinator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletState {
    /// Contract deployed, no spend attempt in flight
    Deployed,
    /// A commitment is registered and awaiting its reveal window
    Committed,
    /// The last attempt revealed successfully; a new attempt may start
    Revealed,
}

impl WalletState {
    pub(crate) fn ensure_can_commit(self) -> WalletResult<()> {
        match self {
            WalletState::Committed => Err(WalletError::state(
                "a spend attempt is already in flight; reveal or abandon it first",
            )),
            _ => Ok(()),
        }
    }

    pub(crate) fn ensure_can_reveal(self) -> WalletResult<()> {
        match self {
            WalletState::Committed => Ok(()),
            _ => Err(WalletError::state("no commitment is awaiting reveal")),
        }
    }
}

/// Result of a commit: the attempt's expiration window and its single-use
/// blinding nonce. The nonce is required at reveal and never reused.
#[derive(Debug, Clone)]
pub struct CommitTicket {
    pub expiration: u64,
    pub nonce: Vec<u8>,
    pub receipt: TxReceipt,
}

/// Outcome of a full commit-reveal spend
#[derive(Debug, Clone)]
pub struct SpendOutcome {
    pub commit: TxReceipt,
    pub reveal: TxReceipt,
    pub expiration: u64,
}

/// Suspend until wall-clock time reaches `expiration`: one scheduled sleep
/// to the target instant, not a polling loop. No-op if already past.
pub async fn await_expiration(expiration: u64) {
    let now = clock::now_unix();
    if expiration > now {
        let target = tokio::time::Instant::now() + Duration::from_secs(expiration - now);
        tokio::time::sleep_until(target).await;
    }
}

pub(crate) fn fresh_nonce() -> Vec<u8> {
    use rand::RngCore;
    let mut nonce = vec![0u8; crate::config::protocol::COMMITMENT_NONCE_SIZE_BYTES];
    rand::rng().fill_bytes(&mut nonce);
    nonce
}
