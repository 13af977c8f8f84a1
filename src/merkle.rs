//! # Merkle Commitment over Rotation Schedules
//!
//! An immutable, index-addressed arena of leaf hashes plus one root. No
//! pointer-linked node graph exists; inclusion proofs are derived by
//! recomputing levels over the array on demand.
//!
//! Hashing is sorted-pair: interior nodes hash `min(a,b) || max(a,b)`, so a
//! verifier folds a proof without needing left/right direction bits. Leaf
//! and interior hashes carry distinct prefix bytes to rule out
//! second-preimage games between the two node kinds. An unpaired node at
//! the end of an odd-width level is promoted unchanged to the next level.

use crate::error::{WalletError, WalletResult};
use crate::ibe::Ciphertext;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A node hash in the commitment tree
pub type Hash32 = [u8; 32];

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Hash a schedule leaf: the ciphertext fields and the rotation's
/// expiration timestamp
pub fn leaf_hash(ciphertext: &Ciphertext, expiration: u64) -> Hash32 {
    let mut hasher = Sha256::new();
    hasher.update([LEAF_PREFIX]);
    hasher.update(&ciphertext.u);
    hasher.update(&ciphertext.v);
    hasher.update(&ciphertext.w);
    hasher.update(expiration.to_be_bytes());
    hasher.finalize().into()
}

fn combine(a: &Hash32, b: &Hash32) -> Hash32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Sha256::new();
    hasher.update([NODE_PREFIX]);
    hasher.update(lo);
    hasher.update(hi);
    hasher.finalize().into()
}

/// Immutable Merkle commitment over an ordered sequence of leaf hashes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleTree {
    leaves: Vec<Hash32>,
    root: Hash32,
}

impl MerkleTree {
    /// Build the commitment over ordered leaf hashes.
    /// Fails with `EmptySchedule` when no leaves are given.
    pub fn from_leaves(leaves: Vec<Hash32>) -> WalletResult<Self> {
        if leaves.is_empty() {
            return Err(WalletError::EmptySchedule);
        }
        let root = Self::compute_root(&leaves);
        Ok(Self { leaves, root })
    }

    fn compute_root(leaves: &[Hash32]) -> Hash32 {
        let mut level = leaves.to_vec();
        while level.len() > 1 {
            level = Self::next_level(&level);
        }
        level[0]
    }

    fn next_level(level: &[Hash32]) -> Vec<Hash32> {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            match pair {
                [a, b] => next.push(combine(a, b)),
                [a] => next.push(*a),
                _ => unreachable!(),
            }
        }
        next
    }

    /// The published commitment root
    pub fn root(&self) -> Hash32 {
        self.root
    }

    /// Number of leaves in the tree
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the tree holds no leaves (never true for a built tree)
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Leaf hash at an index
    pub fn leaf(&self, index: usize) -> Option<&Hash32> {
        self.leaves.get(index)
    }

    /// Inclusion proof for the leaf at `index`: the ordered sequence of
    /// sibling hashes from the leaf level up to (excluding) the root.
    pub fn proof(&self, index: usize) -> WalletResult<Vec<Hash32>> {
        if index >= self.leaves.len() {
            return Err(WalletError::crypto(format!(
                "leaf index {} out of range ({} leaves)",
                index,
                self.leaves.len()
            )));
        }

        let mut proof = Vec::new();
        let mut level = self.leaves.clone();
        let mut position = index;
        while level.len() > 1 {
            let sibling = position ^ 1;
            if sibling < level.len() {
                proof.push(level[sibling]);
            }
            position /= 2;
            level = Self::next_level(&level);
        }
        Ok(proof)
    }
}

/// Verify a leaf's inclusion proof against a published root by refolding
/// the sibling hashes up to the root
pub fn verify_proof(leaf: Hash32, proof: &[Hash32], root: Hash32) -> bool {
    let mut current = leaf;
    for sibling in proof {
        current = combine(&current, sibling);
    }
    current == root
}
