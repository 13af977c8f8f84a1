//! # Chronovault: Timelock Commit-Reveal Wallet Library
//!
//! Core library for timelock-encrypted wallets driven by a drand-style
//! randomness beacon. Secrets are encrypted to future beacon rounds with
//! identity-based encryption, so spends settle without any trusted party
//! holding the keys: once the beacon publishes a round's signature, anyone
//! can derive the unlock key and verify the reveal.

pub mod beacon;
pub mod clock;
pub mod config;
pub mod error;
pub mod ibe;
pub mod ledger;
pub mod merkle;
pub mod otp;
pub mod schedule;
pub mod timelock;
pub mod wallet;

// Re-export commonly used types
pub use beacon::{BeaconGateway, ChainInfo, HttpBeaconClient, RoundSignature};
pub use error::{WalletError, WalletResult};
pub use ledger::{MemoryLedger, TimelockLedger};
pub use schedule::RotationSchedule;
pub use timelock::TimelockCodec;
pub use wallet::{OtpParams, OtpWallet, PasswordWallet, WalletRecord};
