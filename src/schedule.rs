//! # OTP Rotation Schedule
//!
//! Builds the pre-encrypted rotation schedule at wallet initialization:
//! one timelocked token per rotation, each bound to its rotation's
//! expiration boundary, committed compactly under a Merkle root. The
//! schedule is immutable after `build` and safe to share read-only.
//!
//! The seed that generated the tokens is deliberately not part of this
//! type or its persisted dump; it lives in the wallet record.

use crate::clock;
use crate::error::{WalletError, WalletResult};
use crate::ibe::Ciphertext;
use crate::merkle::{self, Hash32, MerkleTree};
use crate::otp::OtpGenerator;
use crate::timelock::TimelockCodec;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One Merkle leaf: a timelocked token ciphertext and the rotation's
/// expiration timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub ciphertext: Ciphertext,
    pub expiration: u64,
}

/// An ordered, provable commitment over a wallet's OTP rotations.
/// Entry `i` (1-based counter) expires at `genesis + i * interval`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationSchedule {
    genesis: u64,
    interval: u64,
    entries: Vec<ScheduleEntry>,
    tree: MerkleTree,
}

impl RotationSchedule {
    /// Pre-encrypt every rotation's token and build the commitment tree.
    ///
    /// For `counter = 1..=rotations`: derives the token, timelock-encrypts
    /// its ASCII digits for `genesis + counter * interval`, and appends the
    /// leaf. Fails with `EmptySchedule` when `rotations < 1`.
    pub fn build(
        codec: &TimelockCodec,
        generator: &OtpGenerator,
        genesis: u64,
        interval: u64,
        rotations: u32,
    ) -> WalletResult<Self> {
        if rotations < 1 {
            return Err(WalletError::EmptySchedule);
        }
        if interval == 0 {
            return Err(WalletError::clock(
                "rotation interval must be a positive number of seconds",
            ));
        }

        let mut entries = Vec::with_capacity(rotations as usize);
        for counter in 1..=u64::from(rotations) {
            let expiration = genesis + counter * interval;
            let token = generator.generate(counter)?;
            let ciphertext = codec.encrypt(token.as_bytes(), expiration)?;
            entries.push(ScheduleEntry {
                ciphertext,
                expiration,
            });
        }

        let tree = MerkleTree::from_leaves(Self::leaf_hashes(&entries))?;
        Ok(Self {
            genesis,
            interval,
            entries,
            tree,
        })
    }

    fn leaf_hashes(entries: &[ScheduleEntry]) -> Vec<Hash32> {
        entries
            .iter()
            .map(|entry| merkle::leaf_hash(&entry.ciphertext, entry.expiration))
            .collect()
    }

    /// The published Merkle root, the only schedule data the ledger holds
    pub fn root(&self) -> Hash32 {
        self.tree.root()
    }

    pub fn genesis(&self) -> u64 {
        self.genesis
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Expiration of the final rotation; the schedule is exhausted once the
    /// clock passes this instant
    pub fn last_expiration(&self) -> u64 {
        // entries is never empty for a built schedule
        self.entries.last().map(|e| e.expiration).unwrap_or(self.genesis)
    }

    /// Rotation boundary covering `now`, or `ScheduleExhausted` when the
    /// schedule has no rotation left for it
    pub fn active_expiration(&self, now: u64) -> WalletResult<u64> {
        let mut boundary = clock::next_boundary(self.genesis, self.interval, now)?;
        if boundary == self.genesis {
            // at the genesis instant the first rotation is the active one
            boundary = self.genesis + self.interval;
        }
        if boundary > self.last_expiration() {
            return Err(WalletError::ScheduleExhausted {
                last_expiration: self.last_expiration(),
                now,
            });
        }
        Ok(boundary)
    }

    /// Locate the schedule leaf with an exact expiration timestamp.
    /// Fails with `ProofNotFound` when no leaf matches.
    pub fn find_by_expiration(&self, expiration: u64) -> WalletResult<(usize, &ScheduleEntry)> {
        self.entries
            .binary_search_by_key(&expiration, |entry| entry.expiration)
            .map(|index| (index, &self.entries[index]))
            .map_err(|_| WalletError::ProofNotFound { expiration })
    }

    /// Inclusion proof for the leaf at `index` against the published root
    pub fn proof_for(&self, index: usize) -> WalletResult<Vec<Hash32>> {
        self.tree.proof(index)
    }

    /// Persist the schedule dump as pretty-printed JSON
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

    /// Load a schedule dump, verifying the stored root against the leaves
    pub fn load_from_file(path: impl AsRef<Path>) -> WalletResult<Self> {
        let json = std::fs::read_to_string(path)?;
        let schedule: RotationSchedule = serde_json::from_str(&json)?;
        let recomputed = MerkleTree::from_leaves(Self::leaf_hashes(&schedule.entries))?;
        if recomputed.root() != schedule.tree.root() {
            return Err(WalletError::crypto(
                "schedule dump root does not match its leaves",
            ));
        }
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beacon::ChainInfo;
    use crate::ibe::test_beacon;
    use crate::merkle::verify_proof;

    const T0: u64 = 1_700_000_000;

    fn codec() -> TimelockCodec {
        TimelockCodec::new(ChainInfo {
            public_key: test_beacon::public_key_hex(),
            period: 30,
            genesis_time: 1_600_000_000,
            hash: "test".to_string(),
        })
        .unwrap()
    }

    fn generator() -> OtpGenerator {
        OtpGenerator::new(6, b"12345678901234567890".to_vec()).unwrap()
    }

    #[test]
    fn test_entries_are_evenly_spaced_and_increasing() {
        let schedule = RotationSchedule::build(&codec(), &generator(), T0, 60, 3).unwrap();
        let expirations: Vec<u64> = schedule.entries().iter().map(|e| e.expiration).collect();
        assert_eq!(expirations, vec![T0 + 60, T0 + 120, T0 + 180]);
        assert_eq!(schedule.last_expiration(), T0 + 180);
    }

    #[test]
    fn test_empty_schedule_rejected() {
        assert!(matches!(
            RotationSchedule::build(&codec(), &generator(), T0, 60, 0),
            Err(WalletError::EmptySchedule)
        ));
        assert!(matches!(
            RotationSchedule::build(&codec(), &generator(), T0, 0, 3),
            Err(WalletError::Clock { .. })
        ));
    }

    #[test]
    fn test_every_leaf_proof_verifies_against_root() {
        let schedule = RotationSchedule::build(&codec(), &generator(), T0, 60, 5).unwrap();
        for (i, entry) in schedule.entries().iter().enumerate() {
            let proof = schedule.proof_for(i).unwrap();
            let leaf = merkle::leaf_hash(&entry.ciphertext, entry.expiration);
            assert!(verify_proof(leaf, &proof, schedule.root()));
        }
    }

    #[test]
    fn test_find_by_expiration() {
        let schedule = RotationSchedule::build(&codec(), &generator(), T0, 60, 3).unwrap();
        let (index, entry) = schedule.find_by_expiration(T0 + 120).unwrap();
        assert_eq!(index, 1);
        assert_eq!(entry.expiration, T0 + 120);

        // No leaf at T0+150: the caller miscomputed the boundary
        assert!(matches!(
            schedule.find_by_expiration(T0 + 150),
            Err(WalletError::ProofNotFound { expiration }) if expiration == T0 + 150
        ));
    }

    #[test]
    fn test_active_expiration_tracks_boundaries() {
        let schedule = RotationSchedule::build(&codec(), &generator(), T0, 60, 3).unwrap();
        assert_eq!(schedule.active_expiration(T0).unwrap(), T0 + 60);
        assert_eq!(schedule.active_expiration(T0 + 95).unwrap(), T0 + 120);
        assert_eq!(schedule.active_expiration(T0 + 180).unwrap(), T0 + 180);
        assert!(matches!(
            schedule.active_expiration(T0 + 181),
            Err(WalletError::ScheduleExhausted { .. })
        ));
    }

    #[test]
    fn test_schedule_dump_round_trip() {
        let dir = std::env::temp_dir().join("chronovault-schedule-test");
        let path = dir.join("schedule.json");
        let schedule = RotationSchedule::build(&codec(), &generator(), T0, 60, 3).unwrap();
        schedule.save_to_file(&path).unwrap();

        let loaded = RotationSchedule::load_from_file(&path).unwrap();
        assert_eq!(loaded.root(), schedule.root());
        assert_eq!(loaded.entries(), schedule.entries());
        std::fs::remove_dir_all(dir).ok();
    }
}
