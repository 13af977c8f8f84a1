//! # Value-Holding Ledger Interface
//!
//! The ledger contract owns the escrowed balance and the authoritative
//! commitment map; the wallet coordinator only proposes transactions. This
//! module defines the narrow async surface the coordinator consumes, plus
//! `MemoryLedger`, an in-process double that performs the same checks the
//! on-chain verifier would: commitment recomputation, Merkle inclusion, and
//! the symmetric-unlock check on the supplied pairing value.

use crate::error::{WalletError, WalletResult};
use crate::ibe::{self, Ciphertext};
use crate::merkle::{self, Hash32};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

/// A ledger-side opaque commitment value
pub type CommitmentHash = [u8; 32];

/// Receipt for a submitted, finalized ledger transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub id: String,
}

/// Compute the commitment hash binding the secret block, the blinding
/// nonce, and the spend destination:
/// `sha256(secret_block || nonce || recipient || amount_be)`
pub fn commitment_hash(
    secret_block: &[u8],
    nonce: &[u8],
    recipient: &str,
    amount: u64,
) -> CommitmentHash {
    let mut hasher = Sha256::new();
    hasher.update(secret_block);
    hasher.update(nonce);
    hasher.update(recipient.as_bytes());
    hasher.update(amount.to_be_bytes());
    hasher.finalize().into()
}

/// Reveal material submitted to the ledger. The optional fields carry the
/// OTP variant's schedule leaf and proof; the password variant's ciphertext
/// already lives on the ledger.
#[derive(Debug, Clone)]
pub struct RevealRequest {
    pub nonce: Vec<u8>,
    pub recipient: String,
    pub amount: u64,
    /// Serialized unlock pairing `e(U, round_signature)`
    pub unlock_key: Vec<u8>,
    pub ciphertext: Option<Ciphertext>,
    pub expiration: Option<u64>,
    pub proof: Option<Vec<Hash32>>,
}

/// Narrow interface over the value-holding ledger contract, swappable for
/// a test double
#[async_trait]
pub trait TimelockLedger: Send + Sync {
    /// Deploy a password-wallet contract holding a single timelocked
    /// ciphertext; returns the contract address
    async fn deploy_password(
        &self,
        ciphertext: Ciphertext,
        expiration: u64,
        collateral: u64,
    ) -> WalletResult<String>;

    /// Deploy an OTP-wallet contract holding only the schedule's Merkle
    /// root and rotation parameters; returns the contract address
    async fn deploy_otp(
        &self,
        merkle_root: Hash32,
        genesis: u64,
        interval: u64,
        collateral: u64,
    ) -> WalletResult<String>;

    /// Submit a commitment with the required collateral value attached
    async fn commit(
        &self,
        address: &str,
        commitment: CommitmentHash,
        expiration: Option<u64>,
        value: u64,
    ) -> WalletResult<TxReceipt>;

    /// Submit reveal material; the ledger independently recomputes the
    /// commitment, checks the proof or stored ciphertext, validates the
    /// unlock key, and releases funds on success
    async fn reveal(&self, address: &str, request: RevealRequest) -> WalletResult<TxReceipt>;

    /// Stored ciphertext (password variant)
    async fn ciphertext(&self, address: &str) -> WalletResult<Ciphertext>;

    /// Stored expiration timestamp (password variant)
    async fn expiration_timestamp(&self, address: &str) -> WalletResult<u64>;

    /// Collateral required per commitment
    async fn commitment_collateral(&self, address: &str) -> WalletResult<u64>;

    /// Whether a commitment hash is currently registered and unspent
    async fn is_committed(&self, address: &str, commitment: CommitmentHash) -> WalletResult<bool>;

    /// Escrowed balance of the wallet contract
    async fn balance(&self, address: &str) -> WalletResult<u64>;
}

enum ContractVariant {
    Password {
        ciphertext: Ciphertext,
        expiration: u64,
    },
    Otp {
        merkle_root: Hash32,
    },
}

struct WalletContract {
    variant: ContractVariant,
    collateral: u64,
    balance: u64,
    commitments: HashMap<CommitmentHash, bool>,
}

/// In-process ledger double with the verifier logic of the on-chain
/// contract. Escrow balances are plain integers; deposits are made with
/// [`MemoryLedger::fund`].
#[derive(Default)]
pub struct MemoryLedger {
    contracts: Mutex<HashMap<String, WalletContract>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deposit spendable funds into a deployed wallet contract
    pub fn fund(&self, address: &str, amount: u64) -> WalletResult<()> {
        let mut contracts = self.contracts.lock().expect("ledger lock poisoned");
        let contract = contracts
            .get_mut(address)
            .ok_or_else(|| WalletError::state(format!("no contract at {}", address)))?;
        contract.balance += amount;
        Ok(())
    }

    fn insert(&self, contract: WalletContract) -> String {
        let mut contracts = self.contracts.lock().expect("ledger lock poisoned");
        let address = format!("mem-{:04x}", contracts.len());
        contracts.insert(address.clone(), contract);
        address
    }

    fn with_contract<T>(
        &self,
        address: &str,
        f: impl FnOnce(&mut WalletContract) -> WalletResult<T>,
    ) -> WalletResult<T> {
        let mut contracts = self.contracts.lock().expect("ledger lock poisoned");
        let contract = contracts
            .get_mut(address)
            .ok_or_else(|| WalletError::state(format!("no contract at {}", address)))?;
        f(contract)
    }

    fn receipt(kind: &str, address: &str, payload: &[u8]) -> TxReceipt {
        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update(address.as_bytes());
        hasher.update(payload);
        TxReceipt {
            id: hex::encode(&hasher.finalize()[..16]),
        }
    }
}

#[async_trait]
impl TimelockLedger for MemoryLedger {
    async fn deploy_password(
        &self,
        ciphertext: Ciphertext,
        expiration: u64,
        collateral: u64,
    ) -> WalletResult<String> {
        ciphertext.validate()?;
        Ok(self.insert(WalletContract {
            variant: ContractVariant::Password {
                ciphertext,
                expiration,
            },
            collateral,
            balance: 0,
            commitments: HashMap::new(),
        }))
    }

    async fn deploy_otp(
        &self,
        merkle_root: Hash32,
        _genesis: u64,
        _interval: u64,
        collateral: u64,
    ) -> WalletResult<String> {
        Ok(self.insert(WalletContract {
            variant: ContractVariant::Otp { merkle_root },
            collateral,
            balance: 0,
            commitments: HashMap::new(),
        }))
    }

    async fn commit(
        &self,
        address: &str,
        commitment: CommitmentHash,
        _expiration: Option<u64>,
        value: u64,
    ) -> WalletResult<TxReceipt> {
        self.with_contract(address, |contract| {
            if value != contract.collateral {
                return Err(WalletError::reverted(
                    "commit",
                    format!(
                        "collateral value {} does not match required {}",
                        value, contract.collateral
                    ),
                ));
            }
            // A spent commitment hash can never be re-armed
            if contract.commitments.get(&commitment) == Some(&false) {
                return Err(WalletError::reverted(
                    "commit",
                    "commitment hash was already revealed",
                ));
            }
            contract.balance += value;
            contract.commitments.insert(commitment, true);
            Ok(Self::receipt("commit", address, &commitment))
        })
    }

    async fn reveal(&self, address: &str, request: RevealRequest) -> WalletResult<TxReceipt> {
        self.with_contract(address, |contract| {
            // Resolve the ciphertext the unlock key must open
            let ciphertext = match (&contract.variant, &request) {
                (ContractVariant::Password { ciphertext, .. }, _) => ciphertext.clone(),
                (
                    ContractVariant::Otp { merkle_root },
                    RevealRequest {
                        ciphertext: Some(ciphertext),
                        expiration: Some(expiration),
                        proof: Some(proof),
                        ..
                    },
                ) => {
                    let leaf = merkle::leaf_hash(ciphertext, *expiration);
                    if !merkle::verify_proof(leaf, proof, *merkle_root) {
                        return Err(WalletError::reverted(
                            "reveal",
                            "Merkle proof does not verify against the schedule root",
                        ));
                    }
                    ciphertext.clone()
                }
                (ContractVariant::Otp { .. }, _) => {
                    return Err(WalletError::reverted(
                        "reveal",
                        "OTP reveal requires ciphertext, expiration and proof",
                    ));
                }
            };

            // Symmetric-unlock check: the pairing value must open V/W back
            // to a block consistent with U
            let block = ibe::open_with_unlock_key(&ciphertext, &request.unlock_key)
                .map_err(|e| WalletError::reverted("reveal", e.to_string()))?;

            // The revealed parameters must hash to a registered commitment
            let commitment =
                commitment_hash(&block, &request.nonce, &request.recipient, request.amount);
            match contract.commitments.get(&commitment) {
                Some(true) => {}
                Some(false) => {
                    return Err(WalletError::reverted(
                        "reveal",
                        "commitment already revealed",
                    ));
                }
                None => {
                    return Err(WalletError::reverted(
                        "reveal",
                        "no matching commitment registered",
                    ));
                }
            }

            if contract.balance < request.amount {
                return Err(WalletError::InsufficientBalance {
                    required: request.amount,
                    available: contract.balance,
                });
            }

            contract.balance -= request.amount;
            contract.commitments.insert(commitment, false);
            Ok(Self::receipt("reveal", address, &commitment))
        })
    }

    async fn ciphertext(&self, address: &str) -> WalletResult<Ciphertext> {
        self.with_contract(address, |contract| match &contract.variant {
            ContractVariant::Password { ciphertext, .. } => Ok(ciphertext.clone()),
            ContractVariant::Otp { .. } => Err(WalletError::state(
                "OTP wallet contracts store a Merkle root, not a ciphertext",
            )),
        })
    }

    async fn expiration_timestamp(&self, address: &str) -> WalletResult<u64> {
        self.with_contract(address, |contract| match &contract.variant {
            ContractVariant::Password { expiration, .. } => Ok(*expiration),
            ContractVariant::Otp { .. } => Err(WalletError::state(
                "OTP wallet contracts have per-rotation expirations",
            )),
        })
    }

    async fn commitment_collateral(&self, address: &str) -> WalletResult<u64> {
        self.with_contract(address, |contract| Ok(contract.collateral))
    }

    async fn is_committed(&self, address: &str, commitment: CommitmentHash) -> WalletResult<bool> {
        self.with_contract(address, |contract| {
            Ok(contract.commitments.get(&commitment).copied() == Some(true))
        })
    }

    async fn balance(&self, address: &str) -> WalletResult<u64> {
        self.with_contract(address, |contract| Ok(contract.balance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ibe::test_beacon;
    use crate::timelock::round_identity;

    fn encrypted_block(round: u64, material: &[u8]) -> (Ciphertext, Vec<u8>, [u8; 32]) {
        let pk = test_beacon::public_key();
        let block = ibe::pad_block(material).unwrap();
        let ciphertext = ibe::encrypt(&pk, &round_identity(round), &block).unwrap();
        let signature = test_beacon::sign_identity(&round_identity(round));
        let unlock_key = ibe::unlock_pairing(&ciphertext, &signature).unwrap();
        (ciphertext, unlock_key, block)
    }

    #[tokio::test]
    async fn test_password_commit_reveal_releases_funds() {
        let ledger = MemoryLedger::new();
        let (ciphertext, unlock_key, block) = encrypted_block(9, b"password-bytes");
        let address = ledger
            .deploy_password(ciphertext, 2_000, 100)
            .await
            .unwrap();
        ledger.fund(&address, 5_000).unwrap();

        let nonce = vec![7u8; 16];
        let commitment = commitment_hash(&block, &nonce, "alice", 1_500);
        ledger.commit(&address, commitment, None, 100).await.unwrap();
        assert!(ledger.is_committed(&address, commitment).await.unwrap());

        ledger
            .reveal(
                &address,
                RevealRequest {
                    nonce: nonce.clone(),
                    recipient: "alice".to_string(),
                    amount: 1_500,
                    unlock_key: unlock_key.clone(),
                    ciphertext: None,
                    expiration: None,
                    proof: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(ledger.balance(&address).await.unwrap(), 5_100 - 1_500);
        assert!(!ledger.is_committed(&address, commitment).await.unwrap());

        // The consumed commitment cannot release funds twice
        let again = ledger
            .reveal(
                &address,
                RevealRequest {
                    nonce,
                    recipient: "alice".to_string(),
                    amount: 1_500,
                    unlock_key,
                    ciphertext: None,
                    expiration: None,
                    proof: None,
                },
            )
            .await;
        assert!(matches!(
            again,
            Err(WalletError::TransactionReverted { .. })
        ));
    }

    #[tokio::test]
    async fn test_reveal_with_wrong_nonce_or_amount_reverts() {
        let ledger = MemoryLedger::new();
        let (ciphertext, unlock_key, block) = encrypted_block(3, b"secret");
        let address = ledger.deploy_password(ciphertext, 99, 10).await.unwrap();
        ledger.fund(&address, 1_000).unwrap();

        let nonce = vec![1u8; 16];
        let commitment = commitment_hash(&block, &nonce, "bob", 500);
        ledger.commit(&address, commitment, None, 10).await.unwrap();

        let base = RevealRequest {
            nonce: vec![2u8; 16],
            recipient: "bob".to_string(),
            amount: 500,
            unlock_key: unlock_key.clone(),
            ciphertext: None,
            expiration: None,
            proof: None,
        };
        assert!(ledger.reveal(&address, base.clone()).await.is_err());

        let wrong_amount = RevealRequest {
            nonce,
            amount: 501,
            ..base
        };
        assert!(ledger.reveal(&address, wrong_amount).await.is_err());
    }

    #[tokio::test]
    async fn test_commit_with_wrong_collateral_reverts() {
        let ledger = MemoryLedger::new();
        let (ciphertext, _, _) = encrypted_block(1, b"x");
        let address = ledger.deploy_password(ciphertext, 99, 10).await.unwrap();
        let result = ledger.commit(&address, [0u8; 32], None, 9).await;
        assert!(matches!(
            result,
            Err(WalletError::TransactionReverted { .. })
        ));
    }

    #[tokio::test]
    async fn test_insufficient_balance_surfaces() {
        let ledger = MemoryLedger::new();
        let (ciphertext, unlock_key, block) = encrypted_block(4, b"y");
        let address = ledger.deploy_password(ciphertext, 99, 10).await.unwrap();

        let nonce = vec![3u8; 16];
        let commitment = commitment_hash(&block, &nonce, "carol", 5_000);
        ledger.commit(&address, commitment, None, 10).await.unwrap();

        let result = ledger
            .reveal(
                &address,
                RevealRequest {
                    nonce,
                    recipient: "carol".to_string(),
                    amount: 5_000,
                    unlock_key,
                    ciphertext: None,
                    expiration: None,
                    proof: None,
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(WalletError::InsufficientBalance {
                required: 5_000,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_spent_commitment_cannot_be_rearmed() {
        let ledger = MemoryLedger::new();
        let (ciphertext, unlock_key, block) = encrypted_block(2, b"resurrect");
        let address = ledger.deploy_password(ciphertext, 99, 10).await.unwrap();
        ledger.fund(&address, 1_000).unwrap();

        let nonce = vec![5u8; 16];
        let commitment = commitment_hash(&block, &nonce, "erin", 300);
        ledger.commit(&address, commitment, None, 10).await.unwrap();
        ledger
            .reveal(
                &address,
                RevealRequest {
                    nonce,
                    recipient: "erin".to_string(),
                    amount: 300,
                    unlock_key,
                    ciphertext: None,
                    expiration: None,
                    proof: None,
                },
            )
            .await
            .unwrap();

        // Submitting the identical hash again must not reopen it
        let again = ledger.commit(&address, commitment, None, 10).await;
        assert!(matches!(
            again,
            Err(WalletError::TransactionReverted { .. })
        ));
        assert!(!ledger.is_committed(&address, commitment).await.unwrap());
    }

    #[tokio::test]
    async fn test_otp_reveal_with_tampered_proof_reverts() {
        let ledger = MemoryLedger::new();
        let (ciphertext, unlock_key, block) = encrypted_block(6, b"314159");
        let expiration = 6_000u64;

        let sibling = merkle::leaf_hash(&ciphertext, expiration + 60);
        let leaf = merkle::leaf_hash(&ciphertext, expiration);
        let tree = crate::merkle::MerkleTree::from_leaves(vec![leaf, sibling]).unwrap();
        let address = ledger
            .deploy_otp(tree.root(), 5_940, 60, 10)
            .await
            .unwrap();
        ledger.fund(&address, 1_000).unwrap();

        let nonce = vec![4u8; 16];
        let commitment = commitment_hash(&block, &nonce, "dave", 200);
        ledger
            .commit(&address, commitment, Some(expiration), 10)
            .await
            .unwrap();

        let mut bad_proof = tree.proof(0).unwrap();
        bad_proof[0][0] ^= 0xFF;
        let result = ledger
            .reveal(
                &address,
                RevealRequest {
                    nonce: nonce.clone(),
                    recipient: "dave".to_string(),
                    amount: 200,
                    unlock_key: unlock_key.clone(),
                    ciphertext: Some(ciphertext.clone()),
                    expiration: Some(expiration),
                    proof: Some(bad_proof),
                },
            )
            .await;
        assert!(matches!(
            result,
            Err(WalletError::TransactionReverted { .. })
        ));

        // The untampered proof releases the funds
        ledger
            .reveal(
                &address,
                RevealRequest {
                    nonce,
                    recipient: "dave".to_string(),
                    amount: 200,
                    unlock_key,
                    ciphertext: Some(ciphertext),
                    expiration: Some(expiration),
                    proof: Some(tree.proof(0).unwrap()),
                },
            )
            .await
            .unwrap();
        assert_eq!(ledger.balance(&address).await.unwrap(), 810);
    }
}
