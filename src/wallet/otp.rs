//! # OTP Wallet Coordinator
//!
//! Rotating one-time-password variant. Every rotation's token was
//! pre-encrypted at initialization for that rotation's expiration
//! boundary; only the Merkle root went to the ledger. At spend time the
//! coordinator finds the active window, commits against it, then reveals
//! with the matching schedule leaf and inclusion proof.

use crate::beacon::{self, BeaconGateway};
use crate::clock;
use crate::error::{WalletError, WalletResult};
use crate::ibe;
use crate::ledger::{self, RevealRequest, TimelockLedger, TxReceipt};
use crate::otp::OtpGenerator;
use crate::schedule::RotationSchedule;
use crate::timelock::TimelockCodec;
use crate::wallet::{
    await_expiration, fresh_nonce, CommitTicket, SecretMaterial, SpendOutcome, WalletParams,
    WalletRecord, WalletState,
};

/// Parameters for initializing an OTP wallet
#[derive(Debug, Clone, Copy)]
pub struct OtpParams {
    pub token_digits: u32,
    pub rotation_interval: u64,
    pub rotations: u32,
    pub collateral: u64,
}

/// Commit-reveal coordinator for a deployed OTP wallet. Borrows the
/// rotation schedule read-only; the schedule is never mutated after build.
pub struct OtpWallet<'a> {
    ledger: &'a dyn TimelockLedger,
    beacon: &'a dyn BeaconGateway,
    codec: TimelockCodec,
    generator: OtpGenerator,
    schedule: &'a RotationSchedule,
    address: String,
    collateral: u64,
    state: WalletState,
}

impl<'a> OtpWallet<'a> {
    /// Initialize a new OTP wallet: generate the seed, pre-encrypt the full
    /// rotation schedule, deploy the ledger contract with its Merkle root,
    /// and return the record and schedule to persist.
    ///
    /// Genesis is the current wall-clock instant, floored to whole seconds.
    pub async fn initialize(
        ledger: &dyn TimelockLedger,
        beacon: &dyn BeaconGateway,
        params: OtpParams,
    ) -> WalletResult<(WalletRecord, RotationSchedule)> {
        let chain = beacon.chain_info().await?;
        let codec = TimelockCodec::new(chain)?;

        let seed = OtpGenerator::generate_seed();
        let generator = OtpGenerator::new(params.token_digits, seed.clone())?;
        let genesis = clock::now_unix();

        let schedule = RotationSchedule::build(
            &codec,
            &generator,
            genesis,
            params.rotation_interval,
            params.rotations,
        )?;
        let address = ledger
            .deploy_otp(
                schedule.root(),
                genesis,
                params.rotation_interval,
                params.collateral,
            )
            .await?;
        log::info!(
            "deployed OTP wallet at {} with {} rotations of {}s",
            address,
            params.rotations,
            params.rotation_interval
        );

        let record = WalletRecord {
            params: WalletParams::Otp {
                token_digits: params.token_digits,
                rotation_interval: params.rotation_interval,
                rotations: params.rotations,
                collateral: params.collateral,
            },
            address,
            genesis,
            secret: SecretMaterial::Plaintext { bytes: seed },
            ciphertext: None,
        };
        Ok((record, schedule))
    }

    /// Load a coordinator for an already-deployed wallet from its persisted
    /// record and schedule dump
    pub async fn load(
        ledger: &'a dyn TimelockLedger,
        beacon: &'a dyn BeaconGateway,
        record: &WalletRecord,
        schedule: &'a RotationSchedule,
    ) -> WalletResult<Self> {
        let WalletParams::Otp {
            token_digits,
            rotation_interval,
            rotations,
            collateral,
        } = record.params
        else {
            return Err(WalletError::state("record does not describe an OTP wallet"));
        };

        // The schedule dump must be the one this record was initialized
        // with; a mismatch would otherwise only surface as a reverted
        // reveal against the deployed root.
        if schedule.genesis() != record.genesis {
            return Err(WalletError::state(format!(
                "schedule genesis {} does not match wallet genesis {}",
                schedule.genesis(),
                record.genesis
            )));
        }
        if schedule.interval() != rotation_interval
            || schedule.entries().len() != rotations as usize
        {
            return Err(WalletError::state(format!(
                "schedule shape ({} rotations of {}s) does not match wallet \
                 parameters ({} rotations of {}s)",
                schedule.entries().len(),
                schedule.interval(),
                rotations,
                rotation_interval
            )));
        }

        let chain = beacon.chain_info().await?;
        let codec = TimelockCodec::new(chain)?;
        let generator = OtpGenerator::new(token_digits, record.secret.plaintext()?.to_vec())?;

        Ok(Self {
            ledger,
            beacon,
            codec,
            generator,
            schedule,
            address: record.address.clone(),
            collateral,
            state: WalletState::Deployed,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Derive the token for the rotation covering the current instant,
    /// entirely offline. This is what the spender transcribes and later
    /// feeds back into `commit`.
    pub fn current_token(&self) -> WalletResult<String> {
        self.token_at(clock::now_unix())
    }

    fn token_at(&self, now: u64) -> WalletResult<String> {
        // Confirms the schedule still covers `now` before deriving
        self.schedule.active_expiration(now)?;
        let counter = clock::rotation_counter(
            self.schedule.genesis(),
            self.schedule.interval(),
            now,
        )?
        .max(1);
        self.generator.generate(counter)
    }

    /// Commit to a spend against the currently active rotation window.
    /// Must happen strictly before that window's expiration boundary.
    pub async fn commit(
        &mut self,
        token: &str,
        recipient: &str,
        amount: u64,
    ) -> WalletResult<CommitTicket> {
        self.commit_at(clock::now_unix(), token, recipient, amount)
            .await
    }

    async fn commit_at(
        &mut self,
        now: u64,
        token: &str,
        recipient: &str,
        amount: u64,
    ) -> WalletResult<CommitTicket> {
        self.state.ensure_can_commit()?;
        let expiration = self.schedule.active_expiration(now)?;
        if now >= expiration {
            return Err(WalletError::timing("commit", now, expiration));
        }

        let nonce = fresh_nonce();
        let block = ibe::pad_block(token.as_bytes())?;
        let commitment = ledger::commitment_hash(&block, &nonce, recipient, amount);
        let receipt = self
            .ledger
            .commit(&self.address, commitment, Some(expiration), self.collateral)
            .await?;
        log::info!("published commitment tx {}", receipt.id);

        self.state = WalletState::Committed;
        Ok(CommitTicket {
            expiration,
            nonce,
            receipt,
        })
    }

    /// Reveal the committed spend for the rotation expiring at
    /// `expiration`. The schedule leaf is located and proven before any
    /// network call; the beacon signature is then awaited and the unlock
    /// material submitted.
    pub async fn reveal(
        &mut self,
        nonce: &[u8],
        recipient: &str,
        amount: u64,
        expiration: u64,
    ) -> WalletResult<TxReceipt> {
        self.reveal_at(clock::now_unix(), nonce, recipient, amount, expiration)
            .await
    }

    async fn reveal_at(
        &mut self,
        now: u64,
        nonce: &[u8],
        recipient: &str,
        amount: u64,
        expiration: u64,
    ) -> WalletResult<TxReceipt> {
        self.state.ensure_can_reveal()?;
        if now < expiration {
            return Err(WalletError::timing("reveal", now, expiration));
        }

        // Schedule lookup happens before anything touches the network
        let (index, entry) = self.schedule.find_by_expiration(expiration)?;
        let proof = self.schedule.proof_for(index)?;

        let available = self.ledger.balance(&self.address).await?;
        if available < amount {
            return Err(WalletError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        let round = self.codec.round_for(expiration);
        let signature = beacon::wait_for_signature(self.beacon, round).await?;
        let unlock_key = self
            .codec
            .derive_unlock_key(&entry.ciphertext, &signature)?;

        let receipt = self
            .ledger
            .reveal(
                &self.address,
                RevealRequest {
                    nonce: nonce.to_vec(),
                    recipient: recipient.to_string(),
                    amount,
                    unlock_key,
                    ciphertext: Some(entry.ciphertext.clone()),
                    expiration: Some(expiration),
                    proof: Some(proof),
                },
            )
            .await?;
        log::info!("published reveal tx {}", receipt.id);

        self.state = WalletState::Revealed;
        Ok(receipt)
    }

    /// Full spend: commit against the active rotation, sleep out its
    /// window, reveal with the matching leaf and proof
    pub async fn spend(
        &mut self,
        token: &str,
        recipient: &str,
        amount: u64,
    ) -> WalletResult<SpendOutcome> {
        let ticket = self.commit(token, recipient, amount).await?;

        if let Some(when) = chrono::DateTime::from_timestamp(ticket.expiration as i64, 0) {
            log::info!("sleeping until rotation expiration {}", when);
        }
        await_expiration(ticket.expiration).await;

        let reveal = self
            .reveal(&ticket.nonce, recipient, amount, ticket.expiration)
            .await?;
        Ok(SpendOutcome {
            commit: ticket.receipt,
            reveal,
            expiration: ticket.expiration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::testing::TestBeacon;
    use crate::ledger::MemoryLedger;

    const INTERVAL: u64 = 60;

    fn beacon() -> TestBeacon {
        TestBeacon::new(clock::now_unix().saturating_sub(7 * 24 * 3_600), 3)
    }

    fn params() -> OtpParams {
        OtpParams {
            token_digits: 6,
            rotation_interval: INTERVAL,
            rotations: 3,
            collateral: 100,
        }
    }

    async fn deployed<'a>(
        ledger: &'a MemoryLedger,
        beacon: &'a TestBeacon,
        record: &WalletRecord,
        schedule: &'a RotationSchedule,
    ) -> OtpWallet<'a> {
        OtpWallet::load(ledger, beacon, record, schedule)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_commit_targets_the_active_rotation() {
        let ledger = MemoryLedger::new();
        let beacon = beacon();
        let (record, schedule) = OtpWallet::initialize(&ledger, &beacon, params())
            .await
            .unwrap();
        let mut wallet = deployed(&ledger, &beacon, &record, &schedule).await;

        let genesis = record.genesis;
        let token = wallet.token_at(genesis + 95).unwrap();
        let ticket = wallet
            .commit_at(genesis + 95, &token, "alice", 10)
            .await
            .unwrap();
        // counter 2: the boundary after T0+95 is T0+120
        assert_eq!(ticket.expiration, genesis + 120);
    }

    #[tokio::test]
    async fn test_reveal_for_off_schedule_expiration_fails_locally() {
        let ledger = MemoryLedger::new();
        let beacon = beacon();
        let (record, schedule) = OtpWallet::initialize(&ledger, &beacon, params())
            .await
            .unwrap();
        let mut wallet = deployed(&ledger, &beacon, &record, &schedule).await;

        let genesis = record.genesis;
        let token = wallet.token_at(genesis + 30).unwrap();
        wallet
            .commit_at(genesis + 30, &token, "alice", 10)
            .await
            .unwrap();

        // T0+150 is between boundaries: no leaf exists there
        let result = wallet
            .reveal_at(genesis + 200, &[0u8; 16], "alice", 10, genesis + 150)
            .await;
        assert!(matches!(
            result,
            Err(WalletError::ProofNotFound { expiration }) if expiration == genesis + 150
        ));
    }

    #[tokio::test]
    async fn test_full_spend_flow_releases_funds() {
        let ledger = MemoryLedger::new();
        let beacon = beacon();
        let (record, schedule) = OtpWallet::initialize(&ledger, &beacon, params())
            .await
            .unwrap();
        let mut wallet = deployed(&ledger, &beacon, &record, &schedule).await;
        ledger.fund(wallet.address(), 10_000).unwrap();

        let genesis = record.genesis;
        let now = genesis + 30;
        let token = wallet.token_at(now).unwrap();
        let ticket = wallet.commit_at(now, &token, "alice", 2_500).await.unwrap();
        assert_eq!(ticket.expiration, genesis + 60);

        let receipt = wallet
            .reveal_at(ticket.expiration, &ticket.nonce, "alice", 2_500, ticket.expiration)
            .await
            .unwrap();
        assert!(!receipt.id.is_empty());
        // escrow: 10_000 deposit + 100 collateral - 2_500 spend
        assert_eq!(ledger.balance(wallet.address()).await.unwrap(), 7_600);
    }

    #[tokio::test]
    async fn test_reveal_with_wrong_token_reverts_on_ledger() {
        let ledger = MemoryLedger::new();
        let beacon = beacon();
        let (record, schedule) = OtpWallet::initialize(&ledger, &beacon, params())
            .await
            .unwrap();
        let mut wallet = deployed(&ledger, &beacon, &record, &schedule).await;
        ledger.fund(wallet.address(), 10_000).unwrap();

        let genesis = record.genesis;
        let ticket = wallet
            .commit_at(genesis + 30, "000000", "alice", 100)
            .await
            .unwrap();

        // The decrypted leaf token will not match the committed "000000"
        // (the real token for counter 1 differs with overwhelming odds)
        let result = wallet
            .reveal_at(ticket.expiration, &ticket.nonce, "alice", 100, ticket.expiration)
            .await;
        if wallet.generator.generate(1).unwrap() != "000000" {
            assert!(matches!(
                result,
                Err(WalletError::TransactionReverted { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_exhausted_schedule_rejects_commit_and_token() {
        let ledger = MemoryLedger::new();
        let beacon = beacon();
        let (record, schedule) = OtpWallet::initialize(&ledger, &beacon, params())
            .await
            .unwrap();
        let mut wallet = deployed(&ledger, &beacon, &record, &schedule).await;

        let past_last = record.genesis + 3 * INTERVAL + 1;
        assert!(matches!(
            wallet.token_at(past_last),
            Err(WalletError::ScheduleExhausted { .. })
        ));
        assert!(matches!(
            wallet.commit_at(past_last, "123456", "alice", 10).await,
            Err(WalletError::ScheduleExhausted { .. })
        ));
    }

    #[tokio::test]
    async fn test_reveal_amount_over_balance_rejected_before_submission() {
        let ledger = MemoryLedger::new();
        let beacon = beacon();
        let (record, schedule) = OtpWallet::initialize(&ledger, &beacon, params())
            .await
            .unwrap();
        let mut wallet = deployed(&ledger, &beacon, &record, &schedule).await;

        let genesis = record.genesis;
        let token = wallet.token_at(genesis + 30).unwrap();
        let ticket = wallet
            .commit_at(genesis + 30, &token, "alice", 5_000)
            .await
            .unwrap();

        // Only the collateral is escrowed; 5_000 exceeds it
        let result = wallet
            .reveal_at(ticket.expiration, &ticket.nonce, "alice", 5_000, ticket.expiration)
            .await;
        assert!(matches!(
            result,
            Err(WalletError::InsufficientBalance { required: 5_000, .. })
        ));
    }

    #[tokio::test]
    async fn test_load_rejects_mismatched_schedule() {
        let ledger = MemoryLedger::new();
        let beacon = beacon();
        let (record, _) = OtpWallet::initialize(&ledger, &beacon, params())
            .await
            .unwrap();

        // A dump from a different initialization has a different genesis
        let (_, foreign_schedule) = OtpWallet::initialize(&ledger, &beacon, params())
            .await
            .unwrap();
        let mut stale = record.clone();
        stale.genesis = foreign_schedule.genesis().wrapping_sub(1);
        let result = OtpWallet::load(&ledger, &beacon, &stale, &foreign_schedule).await;
        assert!(matches!(result, Err(WalletError::InvalidState { .. })));

        // Same genesis but a different rotation count is also refused
        let mut short = params();
        short.rotations = 2;
        let (mut short_record, short_schedule) =
            OtpWallet::initialize(&ledger, &beacon, short).await.unwrap();
        short_record.params = WalletParams::Otp {
            token_digits: 6,
            rotation_interval: INTERVAL,
            rotations: 3,
            collateral: 100,
        };
        let result =
            OtpWallet::load(&ledger, &beacon, &short_record, &short_schedule).await;
        assert!(matches!(result, Err(WalletError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_token_derivation_is_offline_and_deterministic() {
        let ledger = MemoryLedger::new();
        let beacon = beacon();
        let (record, schedule) = OtpWallet::initialize(&ledger, &beacon, params())
            .await
            .unwrap();
        let wallet = deployed(&ledger, &beacon, &record, &schedule).await;

        let t = record.genesis + 70;
        assert_eq!(wallet.token_at(t).unwrap(), wallet.token_at(t).unwrap());
        // Counter 2 window: same token across the whole window
        assert_eq!(
            wallet.token_at(record.genesis + 61).unwrap(),
            wallet.token_at(record.genesis + 119).unwrap()
        );
    }
}
