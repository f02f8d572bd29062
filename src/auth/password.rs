//! Password record derivation and verification.
//!
//! Only a salted PBKDF2-SHA256 hash is ever stored: algorithm tag,
//! iteration count, base64 salt, base64 derived key. Verification
//! re-derives from the candidate and compares in constant time.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

/// Algorithm tag written into every record.
pub const ALGORITHM: &str = "pbkdf2-sha256";

const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Errors from a stored record that cannot be verified against.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("unsupported password algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("corrupt password record: {0}")]
    Malformed(String),
}

/// Persisted password derivation. Never contains plaintext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordRecord {
    /// Algorithm tag, currently always `pbkdf2-sha256`.
    pub algorithm: String,
    /// Key-stretching iteration count used at derivation time.
    pub iterations: u32,
    /// Base64 random salt.
    pub salt: String,
    /// Base64 derived key.
    pub hash: String,
}

impl PasswordRecord {
    /// Derive a new record from a plaintext password with a fresh salt.
    pub fn derive(password: &str, iterations: u32) -> Self {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);

        let mut derived = Zeroizing::new([0u8; HASH_LEN]);
        pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, derived.as_mut());

        Self {
            algorithm: ALGORITHM.to_string(),
            iterations,
            salt: B64.encode(salt),
            hash: B64.encode(derived.as_ref()),
        }
    }

    /// Constant-time verification of a candidate password.
    pub fn verify(&self, candidate: &str) -> Result<bool, PasswordError> {
        if self.algorithm != ALGORITHM {
            return Err(PasswordError::UnsupportedAlgorithm(self.algorithm.clone()));
        }
        let salt = B64
            .decode(&self.salt)
            .map_err(|e| PasswordError::Malformed(format!("salt: {e}")))?;
        let stored = B64
            .decode(&self.hash)
            .map_err(|e| PasswordError::Malformed(format!("hash: {e}")))?;
        if stored.len() != HASH_LEN {
            return Err(PasswordError::Malformed(format!(
                "hash length {} != {HASH_LEN}",
                stored.len()
            )));
        }

        let mut derived = Zeroizing::new([0u8; HASH_LEN]);
        pbkdf2_hmac::<Sha256>(
            candidate.as_bytes(),
            &salt,
            self.iterations,
            derived.as_mut(),
        );

        Ok(bool::from(derived.as_ref().ct_eq(stored.as_slice())))
    }
}
