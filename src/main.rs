//! # Chronovault: Timelock Commit-Reveal Wallet
//!
//! Chronovault is a wallet proof-of-concept built on timelock encryption
//! against a drand-style randomness beacon. Spending secrets are encrypted
//! to future beacon rounds, so nobody can reveal early and everybody can
//! verify late.
//!
//! ## Overview
//!
//! Two wallet variants share one commit-reveal protocol:
//! 1. **Password wallet**: one shared secret, timelocked to a fixed
//!    expiration.
//! 2. **OTP wallet**: rotating one-time tokens, each pre-encrypted to its
//!    own rotation boundary and committed under a Merkle root.
//!
//! ## Spend Flow
//!
//! ```text
//! ┌─────────────┐   Commit    ┌─────────────┐   Expiration   ┌─────────────┐
//! │   Wallet    │  ────────>  │  Commitment │  ───────────>  │   Beacon    │
//! │  Deployed   │  (hidden)   │  Escrowed   │    passes      │  Publishes  │
//! └─────────────┘             └─────────────┘                └─────────────┘
//!                                                                   │
//!                                                                   ▼
//!                                                            ┌─────────────┐
//!                                                            │   Reveal    │
//!                                                            │  (verified) │
//!                                                            └─────────────┘
//! ```
//!
//! ## Usage Examples
//!
//! ```bash
//! # Create a password wallet expiring in 10 minutes
//! chronovault create-wallet --wallet-type password --lifetime 600
//!
//! # Create an OTP wallet with 16 one-minute rotations
//! chronovault create-wallet --wallet-type otp --rotations 16
//!
//! # Derive the current one-time token offline
//! chronovault show-otp
//!
//! # Run the automated end-to-end demo against the live beacon
//! chronovault auto-demo --scenario otp
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::str::FromStr;

use chronovault::config::{files, protocol};
use chronovault::wallet::{OtpParams, OtpWallet, PasswordWallet, WalletRecord};
use chronovault::{HttpBeaconClient, MemoryLedger, RotationSchedule};

/// Wallet variant selector
#[derive(Clone, Debug)]
pub enum WalletKind {
    /// Single timelocked password with one fixed expiration
    Password,
    /// Rotating one-time tokens under a Merkle root
    Otp,
}

impl FromStr for WalletKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "password" => Ok(WalletKind::Password),
            "otp" => Ok(WalletKind::Otp),
            _ => Err(format!("Invalid wallet type: {}", s)),
        }
    }
}

impl std::fmt::Display for WalletKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WalletKind::Password => write!(f, "password"),
            WalletKind::Otp => write!(f, "otp"),
        }
    }
}

#[derive(Parser)]
#[command(name = "chronovault")]
#[command(about = "A timelock commit-reveal wallet POC using drand")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new wallet and save its record for later use
    CreateWallet {
        /// Wallet variant
        #[arg(long, default_value = "password")]
        wallet_type: WalletKind,
        /// Password wallet lifetime in seconds
        #[arg(short, long, default_value_t = 600)]
        lifetime: u64,
        /// OTP token digits
        #[arg(long, default_value_t = protocol::DEFAULT_OTP_DIGITS)]
        digits: u32,
        /// OTP rotation interval in seconds
        #[arg(long, default_value_t = protocol::DEFAULT_OTP_ROTATION_INTERVAL)]
        interval: u64,
        /// Number of OTP rotations to pre-encrypt
        #[arg(long, default_value_t = protocol::DEFAULT_OTP_ROTATIONS)]
        rotations: u32,
        /// Commitment collateral escrowed per spend attempt
        #[arg(short, long, default_value_t = protocol::DEFAULT_COMMITMENT_COLLATERAL)]
        collateral: u64,
        /// Wallet record file to write
        #[arg(short, long, default_value = files::WALLET_INFO_FILE)]
        wallet_file: String,
        /// Rotation schedule file to write (OTP only)
        #[arg(short, long, default_value = files::ROTATION_SCHEDULE_FILE)]
        schedule_file: String,
    },
    /// Derive the current one-time token from a saved OTP wallet, offline
    ShowOtp {
        /// Wallet record file to load
        #[arg(short, long, default_value = files::WALLET_INFO_FILE)]
        wallet_file: String,
        /// Rotation schedule file to load
        #[arg(short, long, default_value = files::ROTATION_SCHEDULE_FILE)]
        schedule_file: String,
    },
    /// Show the beacon chain parameters the wallet would bind to
    ChainInfo,
    /// Run a fully automated commit-reveal demo against the live beacon
    AutoDemo {
        /// Demo scenario: password, otp
        #[arg(short, long, default_value = "password")]
        scenario: WalletKind,
        /// Spend amount
        #[arg(short, long, default_value_t = 2_500)]
        amount: u64,
        /// Recipient identifier
        #[arg(short, long, default_value = "alice")]
        recipient: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::CreateWallet {
            wallet_type,
            lifetime,
            digits,
            interval,
            rotations,
            collateral,
            wallet_file,
            schedule_file,
        } => {
            create_wallet(
                wallet_type,
                lifetime,
                digits,
                interval,
                rotations,
                collateral,
                &wallet_file,
                &schedule_file,
            )
            .await?;
        }
        Commands::ShowOtp {
            wallet_file,
            schedule_file,
        } => {
            show_otp(&wallet_file, &schedule_file).await?;
        }
        Commands::ChainInfo => {
            chain_info().await?;
        }
        Commands::AutoDemo {
            scenario,
            amount,
            recipient,
        } => {
            auto_demo(scenario, amount, &recipient).await?;
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn create_wallet(
    wallet_type: WalletKind,
    lifetime: u64,
    digits: u32,
    interval: u64,
    rotations: u32,
    collateral: u64,
    wallet_file: &str,
    schedule_file: &str,
) -> Result<()> {
    let beacon = HttpBeaconClient::from_env()?;
    let ledger = MemoryLedger::new();

    match wallet_type {
        WalletKind::Password => {
            let expiration = chronovault::clock::now_unix() + lifetime;
            println!(
                "Creating password wallet expiring at {} ({}s from now)",
                expiration, lifetime
            );

            let (wallet, record) =
                PasswordWallet::initialize(&ledger, &beacon, expiration, collateral).await?;
            record.save_to_file(wallet_file)?;

            println!("Wallet address: {}", wallet.address());
            println!("📁 Wallet record saved to {}", wallet_file);
        }
        WalletKind::Otp => {
            println!(
                "Creating OTP wallet: {} rotations of {}s, {}-digit tokens",
                rotations, interval, digits
            );

            let (record, schedule) = OtpWallet::initialize(
                &ledger,
                &beacon,
                OtpParams {
                    token_digits: digits,
                    rotation_interval: interval,
                    rotations,
                    collateral,
                },
            )
            .await?;
            record.save_to_file(wallet_file)?;
            schedule.save_to_file(schedule_file)?;

            println!("Wallet address: {}", record.address);
            println!("Merkle root:    {}", hex::encode(schedule.root()));
            println!("📁 Wallet record saved to {}", wallet_file);
            println!("📁 Rotation schedule saved to {}", schedule_file);
        }
    }

    println!("\nNote: the ledger contract lives in this process; use auto-demo");
    println!("for a full commit-reveal flow in one run.");
    Ok(())
}

async fn show_otp(wallet_file: &str, schedule_file: &str) -> Result<()> {
    let record = WalletRecord::load_from_file(wallet_file)?;
    let schedule = RotationSchedule::load_from_file(schedule_file)?;

    // Token derivation is offline; the beacon is only contacted for chain
    // parameters when binding the coordinator.
    let beacon = HttpBeaconClient::from_env()?;
    let ledger = MemoryLedger::new();
    let wallet = OtpWallet::load(&ledger, &beacon, &record, &schedule).await?;

    let token = wallet.current_token()?;
    println!("🔑 Current one-time token: {}", token);
    Ok(())
}

async fn chain_info() -> Result<()> {
    use chronovault::BeaconGateway;

    let beacon = HttpBeaconClient::from_env()?;
    let info = beacon.chain_info().await?;

    println!("📡 Beacon Chain Parameters:");
    println!("  Public key:   {}", info.public_key);
    println!("  Period:       {}s", info.period);
    println!("  Genesis time: {}", info.genesis_time);
    if !info.hash.is_empty() {
        println!("  Chain hash:   {}", info.hash);
    }
    Ok(())
}

async fn auto_demo(scenario: WalletKind, amount: u64, recipient: &str) -> Result<()> {
    use chronovault::{BeaconGateway, TimelockLedger};

    println!("🏦 Chronovault Commit-Reveal Demo ({} wallet)\n", scenario);

    let beacon = HttpBeaconClient::from_env()?;
    let ledger = MemoryLedger::new();
    let info = beacon.chain_info().await?;

    // Short windows keep the demo interactive: one to two beacon periods
    // between commit and reveal.
    let window = info.period.max(3) * 2;
    let collateral = protocol::DEFAULT_COMMITMENT_COLLATERAL;

    match scenario {
        WalletKind::Password => {
            let expiration = chronovault::clock::now_unix() + window;
            let (mut wallet, record) =
                PasswordWallet::initialize(&ledger, &beacon, expiration, collateral).await?;
            ledger.fund(wallet.address(), amount * 4)?;

            println!("Wallet deployed at {}", wallet.address());
            println!("Expiration: {} ({}s away)\n", expiration, window);

            let password = record.secret.plaintext()?.to_vec();
            let outcome = wallet.spend(&password, recipient, amount).await?;

            println!("\n✅ Spend complete");
            println!("  Commit tx: {}", outcome.commit.id);
            println!("  Reveal tx: {}", outcome.reveal.id);
            println!(
                "  Remaining balance: {}",
                ledger.balance(wallet.address()).await?
            );
        }
        WalletKind::Otp => {
            let (record, schedule) = OtpWallet::initialize(
                &ledger,
                &beacon,
                OtpParams {
                    token_digits: protocol::DEFAULT_OTP_DIGITS,
                    rotation_interval: window,
                    rotations: 4,
                    collateral,
                },
            )
            .await?;
            let mut wallet = OtpWallet::load(&ledger, &beacon, &record, &schedule).await?;
            ledger.fund(wallet.address(), amount * 4)?;

            println!("Wallet deployed at {}", wallet.address());
            println!("Merkle root: {}\n", hex::encode(schedule.root()));

            let token = wallet.current_token()?;
            println!("🔑 Token for the active rotation: {}", token);

            let outcome = wallet.spend(&token, recipient, amount).await?;

            println!("\n✅ Spend complete");
            println!("  Rotation expired at: {}", outcome.expiration);
            println!("  Commit tx: {}", outcome.commit.id);
            println!("  Reveal tx: {}", outcome.reveal.id);
            println!(
                "  Remaining balance: {}",
                ledger.balance(wallet.address()).await?
            );
        }
    }

    Ok(())
}
