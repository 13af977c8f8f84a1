//! # Configuration Constants
//!
//! This module contains only the configuration values that are actually used
//! throughout the chronovault wallet system.

/// Beacon gateway and network configuration
pub mod network {
    use std::time::Duration;

    /// Default drand gateway base URL (League of Entropy mainnet, default chain)
    pub const DEFAULT_BEACON_URL: &str = "https://api.drand.sh";

    /// User agent sent with beacon gateway requests
    pub const BEACON_USER_AGENT: &str = "chronovault";

    /// Request timeout for network operations
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

    /// Delay between polls while waiting for a beacon round signature
    pub const ROUND_POLL_INTERVAL: Duration = Duration::from_secs(1);

    /// Maximum number of polls while waiting for a beacon round signature.
    /// Bounds the wait so a beacon outage surfaces instead of stalling forever.
    pub const ROUND_POLL_ATTEMPTS: u32 = 120;
}

/// Protocol sizing and timing parameters
///
/// These constants define the fixed sizes of the secret material moving
/// through the commit-reveal protocol. They are part of the wire contract
/// with the ledger verifier and must not change for deployed wallets.
pub mod protocol {
    /// Size of the single-use commitment nonce in bytes.
    ///
    /// The nonce blinds the commitment hash so observers cannot brute-force
    /// the secret proof material from the public commitment before reveal.
    pub const COMMITMENT_NONCE_SIZE_BYTES: usize = 16;

    /// Size of the OTP seed in bytes. The seed is the secret generator of
    /// every one-time token in a rotation schedule and never leaves the
    /// wallet record.
    pub const OTP_SEED_SIZE_BYTES: usize = 128;

    /// Size of a password-wallet password in bytes.
    pub const PASSWORD_SIZE_BYTES: usize = 20;

    /// Size of the identity-based encryption message block in bytes.
    ///
    /// Secret proof material (password bytes or ASCII OTP digits) is
    /// zero-padded to this block before encryption and before commitment
    /// hashing, so the ledger can recompute the commitment from the
    /// decrypted block without knowing the original length.
    pub const IBE_BLOCK_SIZE_BYTES: usize = 32;

    /// Default number of digits in a derived OTP token
    pub const DEFAULT_OTP_DIGITS: u32 = 6;

    /// Default OTP rotation interval in seconds
    pub const DEFAULT_OTP_ROTATION_INTERVAL: u64 = 60;

    /// Default number of pre-encrypted OTP rotations
    pub const DEFAULT_OTP_ROTATIONS: u32 = 16;

    /// Default collateral escrowed per commitment
    pub const DEFAULT_COMMITMENT_COLLATERAL: u64 = 1_000;
}

/// File paths and names
pub mod files {
    /// Persisted wallet-info record
    pub const WALLET_INFO_FILE: &str = "data/wallet.json";

    /// Persisted OTP rotation-schedule dump
    pub const ROTATION_SCHEDULE_FILE: &str = "data/schedule.json";
}

/// Environment variable names
pub mod env {
    /// Beacon gateway base URL override
    pub const BEACON_URL: &str = "BEACON_URL";

    /// Wallet-info file path override
    pub const WALLET_FILE: &str = "WALLET_FILE";

    /// Rotation-schedule file path override
    pub const SCHEDULE_FILE: &str = "SCHEDULE_FILE";
}
