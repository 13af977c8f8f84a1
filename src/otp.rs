//! # One-Time Password Generation
//!
//! Counter-based one-time tokens (RFC 4226 HOTP) derived from a wallet
//! seed. The same `(seed, counter)` pair always yields the same token, so a
//! spender can regenerate the expected token offline without replaying
//! prior generation.

use crate::config::protocol::OTP_SEED_SIZE_BYTES;
use crate::error::{WalletError, WalletResult};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Deterministic counter-based token generator over a fixed seed
#[derive(Debug, Clone)]
pub struct OtpGenerator {
    digits: u32,
    seed: Vec<u8>,
}

impl OtpGenerator {
    /// Create a generator producing `digits`-digit tokens from `seed`
    pub fn new(digits: u32, seed: Vec<u8>) -> WalletResult<Self> {
        if digits == 0 || digits > 9 {
            return Err(WalletError::crypto(format!(
                "token digits must be between 1 and 9, got {}",
                digits
            )));
        }
        if seed.is_empty() {
            return Err(WalletError::crypto("OTP seed must not be empty"));
        }
        Ok(Self { digits, seed })
    }

    /// Generate a fresh random seed
    pub fn generate_seed() -> Vec<u8> {
        let mut seed = vec![0u8; OTP_SEED_SIZE_BYTES];
        rand::rng().fill_bytes(&mut seed);
        seed
    }

    /// Encode a seed in its human-transcribable base32 form
    pub fn encode_seed(seed: &[u8]) -> String {
        base32::encode(base32::Alphabet::Rfc4648 { padding: false }, seed)
    }

    /// Decode a base32-encoded seed
    pub fn decode_seed(encoded: &str) -> WalletResult<Vec<u8>> {
        base32::decode(base32::Alphabet::Rfc4648 { padding: false }, encoded)
            .ok_or_else(|| WalletError::crypto("seed is not valid base32"))
    }

    /// Derive the token for a rotation counter (RFC 4226 dynamic truncation)
    pub fn generate(&self, counter: u64) -> WalletResult<String> {
        let mut mac = HmacSha1::new_from_slice(&self.seed)
            .map_err(|e| WalletError::crypto(format!("HMAC key setup failed: {}", e)))?;
        mac.update(&counter.to_be_bytes());
        let digest = mac.finalize().into_bytes();

        let offset = (digest[digest.len() - 1] & 0x0f) as usize;
        let binary = (u32::from(digest[offset] & 0x7f) << 24)
            | (u32::from(digest[offset + 1]) << 16)
            | (u32::from(digest[offset + 2]) << 8)
            | u32::from(digest[offset + 3]);

        let token = binary % 10u32.pow(self.digits);
        Ok(format!("{:0width$}", token, width = self.digits as usize))
    }
}
