//! # Identity-Based Timelock Encryption Primitive
//!
//! Thin wrapper around the pairing-based encryption scheme used by the
//! timelock protocol, on BLS12-381. The beacon's long-term public key lives
//! in G1, its per-round threshold signatures in G2, and a round identity is
//! hashed to G2 with the standard BLS signature domain separation tag, so a
//! round signature is exactly the IBE decryption key for that round.
//!
//! The scheme follows the drand tlock construction:
//!
//! ```text
//! Q_id = HashToG2(identity)
//! G_id = e(pk, Q_id)
//! r    = H3(sigma, block)          (sigma: fresh random block)
//! U    = r * G1_generator
//! V    = sigma XOR H2(G_id ^ r)
//! W    = block XOR H4(sigma)
//! ```
//!
//! Unlocking never happens locally; the holder derives `e(U, signature)`
//! and hands it to the ledger verifier, which reverses `V`/`W` itself.

use crate::error::{WalletError, WalletResult};
use ark_bls12_381::{Bls12_381, Fr, G1Affine, G1Projective, G2Affine, G2Projective};
use ark_ec::{
    hashing::{
        curve_maps::wb::WBMap, map_to_curve_hasher::MapToCurveBasedHasher, HashToCurve,
    },
    pairing::{Pairing, PairingOutput},
    CurveGroup, Group,
};
use ark_ff::{field_hashers::DefaultFieldHasher, PrimeField};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Domain separation tag for hashing round identities to G2.
/// Matches the drand BLS-on-G2 signature suite, so the beacon's round
/// signature verifies against the same point the ciphertext was bound to.
pub const G2_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

/// Size of the plaintext block in bytes
pub const BLOCK_SIZE: usize = crate::config::protocol::IBE_BLOCK_SIZE_BYTES;

/// Size of a compressed G1 point (ciphertext `U`, beacon public key)
pub const G1_COMPRESSED_SIZE: usize = 48;

/// Size of a compressed G2 point (beacon round signature)
pub const G2_COMPRESSED_SIZE: usize = 96;

/// An identity-based timelock ciphertext bound to one beacon round.
///
/// Immutable once produced. Byte fields are hex-encoded when serialized so
/// the persisted schedule dump stays human-inspectable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext {
    /// Compressed G1 point `r * G1_generator`
    #[serde(with = "hex")]
    pub u: Vec<u8>,
    /// `sigma` masked by the hashed pairing value
    #[serde(with = "hex")]
    pub v: Vec<u8>,
    /// Plaintext block masked by `H4(sigma)`
    #[serde(with = "hex")]
    pub w: Vec<u8>,
}

impl Ciphertext {
    /// Validate the structural shape of the ciphertext fields
    pub fn validate(&self) -> WalletResult<()> {
        if self.u.len() != G1_COMPRESSED_SIZE {
            return Err(WalletError::crypto(format!(
                "ciphertext U must be {} bytes, got {}",
                G1_COMPRESSED_SIZE,
                self.u.len()
            )));
        }
        if self.v.len() != BLOCK_SIZE || self.w.len() != BLOCK_SIZE {
            return Err(WalletError::crypto(format!(
                "ciphertext V/W must be {} bytes, got {}/{}",
                BLOCK_SIZE,
                self.v.len(),
                self.w.len()
            )));
        }
        Ok(())
    }
}

/// Decode a hex-encoded compressed G1 beacon public key
pub fn decode_public_key(public_key_hex: &str) -> WalletResult<G1Affine> {
    let bytes = hex::decode(public_key_hex)
        .map_err(|e| WalletError::crypto(format!("invalid public key hex: {}", e)))?;
    G1Affine::deserialize_compressed(bytes.as_slice())
        .map_err(|e| WalletError::crypto(format!("invalid G1 public key: {:?}", e)))
}

/// Decode a hex-encoded compressed G2 beacon round signature
pub fn decode_signature(signature_hex: &str) -> WalletResult<G2Affine> {
    let bytes = hex::decode(signature_hex)
        .map_err(|e| WalletError::crypto(format!("invalid signature hex: {}", e)))?;
    if bytes.len() != G2_COMPRESSED_SIZE {
        return Err(WalletError::crypto(format!(
            "signature must be {} bytes, got {}",
            G2_COMPRESSED_SIZE,
            bytes.len()
        )));
    }
    G2Affine::deserialize_compressed(bytes.as_slice())
        .map_err(|e| WalletError::crypto(format!("invalid G2 signature: {:?}", e)))
}

/// Hash an identity to a point in G2
pub fn hash_to_g2(identity: &[u8]) -> WalletResult<G2Affine> {
    let hasher = MapToCurveBasedHasher::<
        G2Projective,
        DefaultFieldHasher<Sha256, 128>,
        WBMap<ark_bls12_381::g2::Config>,
    >::new(G2_DST)
    .map_err(|e| WalletError::crypto(format!("hash-to-curve setup failed: {:?}", e)))?;
    hasher
        .hash(identity)
        .map_err(|e| WalletError::crypto(format!("hash-to-curve failed: {:?}", e)))
}

/// Zero-pad secret proof material to the fixed plaintext block.
/// Fails if the material is longer than one block.
pub fn pad_block(material: &[u8]) -> WalletResult<[u8; BLOCK_SIZE]> {
    if material.len() > BLOCK_SIZE {
        return Err(WalletError::crypto(format!(
            "secret material is {} bytes, block size is {}",
            material.len(),
            BLOCK_SIZE
        )));
    }
    let mut block = [0u8; BLOCK_SIZE];
    block[..material.len()].copy_from_slice(material);
    Ok(block)
}

/// Encrypt one plaintext block against an identity under the beacon's
/// public key. Fresh randomness (`sigma`) is drawn internally; everything
/// else is deterministic in the inputs.
pub fn encrypt(
    public_key: &G1Affine,
    identity: &[u8],
    block: &[u8; BLOCK_SIZE],
) -> WalletResult<Ciphertext> {
    let q_id = hash_to_g2(identity)?;
    let g_id = Bls12_381::pairing(*public_key, q_id);

    let mut sigma = [0u8; BLOCK_SIZE];
    rand::rng().fill_bytes(&mut sigma);

    let r = h3(&sigma, block);
    let u = (G1Projective::generator() * r).into_affine();

    let mut v = h2(&gt_bytes(&(g_id * r))?);
    xor_in_place(&mut v, &sigma);

    let mut w = h4(&sigma);
    xor_in_place(&mut w, block);

    let mut u_bytes = Vec::with_capacity(G1_COMPRESSED_SIZE);
    u.serialize_compressed(&mut u_bytes)
        .map_err(|e| WalletError::crypto(format!("G1 serialization failed: {:?}", e)))?;

    Ok(Ciphertext {
        u: u_bytes,
        v: v.to_vec(),
        w: w.to_vec(),
    })
}

/// Compute the unlock pairing `e(U, signature)` for a ciphertext, returned
/// in canonical serialized form. This value is the authorization token the
/// ledger verifier checks; it is only derivable once the beacon has
/// published the round's signature.
pub fn unlock_pairing(ciphertext: &Ciphertext, signature: &G2Affine) -> WalletResult<Vec<u8>> {
    ciphertext.validate()?;
    let u = G1Affine::deserialize_compressed(ciphertext.u.as_slice())
        .map_err(|e| WalletError::crypto(format!("invalid ciphertext U: {:?}", e)))?;
    gt_bytes(&Bls12_381::pairing(u, *signature))
}

/// Reverse a ciphertext given its unlock pairing value, returning the
/// plaintext block if and only if the pairing value is consistent with the
/// ciphertext. This is the verifier-side symmetric-unlock check; wallet
/// code never calls it.
pub fn open_with_unlock_key(
    ciphertext: &Ciphertext,
    unlock_key: &[u8],
) -> WalletResult<[u8; BLOCK_SIZE]> {
    ciphertext.validate()?;

    let mut sigma = h2(unlock_key);
    xor_in_place(&mut sigma, &ciphertext.v);

    let mut block = h4(&sigma);
    xor_in_place(&mut block, &ciphertext.w);

    // A correct unlock key reproduces the encryptor's U exactly
    let r = h3(&sigma, &block);
    let expected_u = (G1Projective::generator() * r).into_affine();
    let mut expected_bytes = Vec::with_capacity(G1_COMPRESSED_SIZE);
    expected_u
        .serialize_compressed(&mut expected_bytes)
        .map_err(|e| WalletError::crypto(format!("G1 serialization failed: {:?}", e)))?;

    if expected_bytes != ciphertext.u {
        return Err(WalletError::crypto(
            "unlock key does not open this ciphertext",
        ));
    }
    Ok(block)
}

/// Canonical serialized form of a pairing output
pub fn gt_bytes(value: &PairingOutput<Bls12_381>) -> WalletResult<Vec<u8>> {
    let mut bytes = Vec::new();
    value
        .serialize_compressed(&mut bytes)
        .map_err(|e| WalletError::crypto(format!("Gt serialization failed: {:?}", e)))?;
    Ok(bytes)
}

fn h2(gt: &[u8]) -> [u8; BLOCK_SIZE] {
    tagged_hash(b"chronovault-ibe-h2", &[gt])
}

fn h3(sigma: &[u8; BLOCK_SIZE], block: &[u8; BLOCK_SIZE]) -> Fr {
    let digest = tagged_hash(b"chronovault-ibe-h3", &[sigma, block]);
    Fr::from_be_bytes_mod_order(&digest)
}

fn h4(sigma: &[u8; BLOCK_SIZE]) -> [u8; BLOCK_SIZE] {
    tagged_hash(b"chronovault-ibe-h4", &[sigma])
}

fn tagged_hash(tag: &[u8], parts: &[&[u8]]) -> [u8; BLOCK_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(tag);
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

fn xor_in_place(target: &mut [u8; BLOCK_SIZE], other: &[u8]) {
    for (t, o) in target.iter_mut().zip(other.iter()) {
        *t ^= o;
    }
}

#[cfg(test)]
pub(crate) mod test_beacon {
    //! Deterministic beacon keypair for tests: a known secret scalar, its
    //! G1 public key, and real BLS signatures over arbitrary identities.
    //! The pairing algebra is exercised for real, no network involved.

    use super::*;
    use ark_ec::AffineRepr;

    pub const TEST_SECRET: &[u8] = b"chronovault deterministic test beacon secret";

    pub fn secret_scalar() -> Fr {
        let digest: [u8; 32] = Sha256::digest(TEST_SECRET).into();
        Fr::from_be_bytes_mod_order(&digest)
    }

    pub fn public_key() -> G1Affine {
        (G1Projective::generator() * secret_scalar()).into_affine()
    }

    pub fn public_key_hex() -> String {
        let mut bytes = Vec::new();
        public_key().serialize_compressed(&mut bytes).unwrap();
        hex::encode(bytes)
    }

    pub fn sign_identity(identity: &[u8]) -> G2Affine {
        let q = hash_to_g2(identity).unwrap();
        (q.into_group() * secret_scalar()).into_affine()
    }

    pub fn signature_hex(identity: &[u8]) -> String {
        let mut bytes = Vec::new();
        sign_identity(identity)
            .serialize_compressed(&mut bytes)
            .unwrap();
        hex::encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_then_open_with_round_signature() {
        let pk = test_beacon::public_key();
        let identity = Sha256::digest(42u64.to_be_bytes());
        let block = pad_block(b"correct horse battery").unwrap();

        let ciphertext = encrypt(&pk, &identity, &block).unwrap();
        ciphertext.validate().unwrap();

        let signature = test_beacon::sign_identity(&identity);
        let unlock_key = unlock_pairing(&ciphertext, &signature).unwrap();

        let opened = open_with_unlock_key(&ciphertext, &unlock_key).unwrap();
        assert_eq!(opened, block);
    }

    #[test]
    fn test_unlock_pairing_is_deterministic() {
        let pk = test_beacon::public_key();
        let identity = Sha256::digest(7u64.to_be_bytes());
        let block = pad_block(b"123456").unwrap();
        let ciphertext = encrypt(&pk, &identity, &block).unwrap();
        let signature = test_beacon::sign_identity(&identity);

        let first = unlock_pairing(&ciphertext, &signature).unwrap();
        let second = unlock_pairing(&ciphertext, &signature).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_wrong_round_signature_yields_different_key() {
        let pk = test_beacon::public_key();
        let identity = Sha256::digest(100u64.to_be_bytes());
        let other_identity = Sha256::digest(101u64.to_be_bytes());
        let block = pad_block(b"654321").unwrap();
        let ciphertext = encrypt(&pk, &identity, &block).unwrap();

        let right = unlock_pairing(&ciphertext, &test_beacon::sign_identity(&identity)).unwrap();
        let wrong =
            unlock_pairing(&ciphertext, &test_beacon::sign_identity(&other_identity)).unwrap();
        assert_ne!(right, wrong);
        assert!(open_with_unlock_key(&ciphertext, &wrong).is_err());
    }

    #[test]
    fn test_pad_block_rejects_oversized_material() {
        assert!(pad_block(&[0u8; BLOCK_SIZE + 1]).is_err());
        let padded = pad_block(b"abc").unwrap();
        assert_eq!(&padded[..3], b"abc");
        assert!(padded[3..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_ciphertext_shape_validation() {
        let pk = test_beacon::public_key();
        let identity = Sha256::digest(1u64.to_be_bytes());
        let block = pad_block(b"x").unwrap();
        let mut ciphertext = encrypt(&pk, &identity, &block).unwrap();
        ciphertext.v.pop();
        assert!(ciphertext.validate().is_err());
    }

    #[test]
    fn test_public_key_hex_round_trip() {
        let decoded = decode_public_key(&test_beacon::public_key_hex()).unwrap();
        assert_eq!(decoded, test_beacon::public_key());
        assert!(decode_public_key("not-hex").is_err());
    }
}
