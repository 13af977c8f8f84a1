//! # Password Wallet Coordinator
//!
//! Single-shared-secret variant: one random password encrypted once for
//! the wallet's fixed expiration. The ciphertext lives on the ledger; the
//! password lives in the wallet record and is re-entered at spend time.

use crate::beacon::{self, BeaconGateway};
use crate::clock;
use crate::config::protocol::PASSWORD_SIZE_BYTES;
use crate::error::{WalletError, WalletResult};
use crate::ibe;
use crate::ledger::{self, RevealRequest, TimelockLedger, TxReceipt};
use crate::timelock::TimelockCodec;
use crate::wallet::{
    await_expiration, fresh_nonce, CommitTicket, SecretMaterial, SpendOutcome, WalletParams,
    WalletRecord, WalletState,
};
use rand::RngCore;

/// Commit-reveal coordinator for a deployed password wallet
pub struct PasswordWallet<'a> {
    ledger: &'a dyn TimelockLedger,
    beacon: &'a dyn BeaconGateway,
    codec: TimelockCodec,
    address: String,
    ciphertext: ibe::Ciphertext,
    expiration: u64,
    collateral: u64,
    state: WalletState,
}

impl<'a> PasswordWallet<'a> {
    /// Generate a fresh random password
    pub fn generate_password() -> Vec<u8> {
        let mut password = vec![0u8; PASSWORD_SIZE_BYTES];
        rand::rng().fill_bytes(&mut password);
        password
    }

    /// Initialize a new password wallet: generate the password, timelock it
    /// for `expiration`, deploy the ledger contract, and return the
    /// coordinator together with the record to persist.
    pub async fn initialize(
        ledger: &'a dyn TimelockLedger,
        beacon: &'a dyn BeaconGateway,
        expiration: u64,
        collateral: u64,
    ) -> WalletResult<(Self, WalletRecord)> {
        let chain = beacon.chain_info().await?;
        let codec = TimelockCodec::new(chain)?;

        let password = Self::generate_password();
        let ciphertext = codec.encrypt(&password, expiration)?;
        let address = ledger
            .deploy_password(ciphertext.clone(), expiration, collateral)
            .await?;
        log::info!("deployed password wallet at {}", address);

        let record = WalletRecord {
            params: WalletParams::Password {
                expiration,
                collateral,
            },
            address: address.clone(),
            genesis: clock::now_unix(),
            secret: SecretMaterial::Plaintext { bytes: password },
            ciphertext: Some(ciphertext.clone()),
        };

        let wallet = Self {
            ledger,
            beacon,
            codec,
            address,
            ciphertext,
            expiration,
            collateral,
            state: WalletState::Deployed,
        };
        Ok((wallet, record))
    }

    /// Load a coordinator for an already-deployed wallet, reading the
    /// authoritative parameters back from the ledger contract
    pub async fn load(
        ledger: &'a dyn TimelockLedger,
        beacon: &'a dyn BeaconGateway,
        record: &WalletRecord,
    ) -> WalletResult<Self> {
        if !matches!(record.params, WalletParams::Password { .. }) {
            return Err(WalletError::state(
                "record does not describe a password wallet",
            ));
        }
        let chain = beacon.chain_info().await?;
        let codec = TimelockCodec::new(chain)?;

        let expiration = ledger.expiration_timestamp(&record.address).await?;
        let collateral = ledger.commitment_collateral(&record.address).await?;
        let ciphertext = ledger.ciphertext(&record.address).await?;

        Ok(Self {
            ledger,
            beacon,
            codec,
            address: record.address.clone(),
            ciphertext,
            expiration,
            collateral,
            state: WalletState::Deployed,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn expiration(&self) -> u64 {
        self.expiration
    }

    /// Commit to a spend of `amount` to `recipient`, blinded by a fresh
    /// nonce. Must happen strictly before the wallet expiration.
    pub async fn commit(
        &mut self,
        password: &[u8],
        recipient: &str,
        amount: u64,
    ) -> WalletResult<CommitTicket> {
        self.commit_at(clock::now_unix(), password, recipient, amount)
            .await
    }

    async fn commit_at(
        &mut self,
        now: u64,
        password: &[u8],
        recipient: &str,
        amount: u64,
    ) -> WalletResult<CommitTicket> {
        self.state.ensure_can_commit()?;
        if now >= self.expiration {
            return Err(WalletError::timing("commit", now, self.expiration));
        }

        let nonce = fresh_nonce();
        let block = ibe::pad_block(password)?;
        let commitment = ledger::commitment_hash(&block, &nonce, recipient, amount);
        let receipt = self
            .ledger
            .commit(&self.address, commitment, None, self.collateral)
            .await?;
        log::info!("published commitment tx {}", receipt.id);

        self.state = WalletState::Committed;
        Ok(CommitTicket {
            expiration: self.expiration,
            nonce,
            receipt,
        })
    }

    /// Reveal the committed spend. Must happen at or after the wallet
    /// expiration; suspends until the beacon publishes the round signature.
    pub async fn reveal(
        &mut self,
        nonce: &[u8],
        recipient: &str,
        amount: u64,
    ) -> WalletResult<TxReceipt> {
        self.reveal_at(clock::now_unix(), nonce, recipient, amount)
            .await
    }

    async fn reveal_at(
        &mut self,
        now: u64,
        nonce: &[u8],
        recipient: &str,
        amount: u64,
    ) -> WalletResult<TxReceipt> {
        self.state.ensure_can_reveal()?;
        if now < self.expiration {
            return Err(WalletError::timing("reveal", now, self.expiration));
        }

        let round = self.codec.round_for(self.expiration);
        let signature = beacon::wait_for_signature(self.beacon, round).await?;
        let unlock_key = self.codec.derive_unlock_key(&self.ciphertext, &signature)?;

        let receipt = self
            .ledger
            .reveal(
                &self.address,
                RevealRequest {
                    nonce: nonce.to_vec(),
                    recipient: recipient.to_string(),
                    amount,
                    unlock_key,
                    ciphertext: None,
                    expiration: None,
                    proof: None,
                },
            )
            .await?;
        log::info!("published reveal tx {}", receipt.id);

        self.state = WalletState::Revealed;
        Ok(receipt)
    }

    /// Full spend: commit, sleep out the window, reveal
    pub async fn spend(
        &mut self,
        password: &[u8],
        recipient: &str,
        amount: u64,
    ) -> WalletResult<SpendOutcome> {
        let ticket = self.commit(password, recipient, amount).await?;

        if let Some(when) = chrono::DateTime::from_timestamp(ticket.expiration as i64, 0) {
            log::info!("sleeping until wallet expiration {}", when);
        }
        await_expiration(ticket.expiration).await;

        let reveal = self.reveal(&ticket.nonce, recipient, amount).await?;
        Ok(SpendOutcome {
            commit: ticket.receipt,
            reveal,
            expiration: ticket.expiration,
        })
    }
}
