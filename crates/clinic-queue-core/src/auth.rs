//! Reset passphrase verification.
//!
//! Only the SHA-256 digest of the passphrase is kept in configuration. The
//! supplied passphrase is hashed and compared in constant time inside the core,
//! never by the caller.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 digest of a passphrase.
pub fn passphrase_digest(passphrase: &str) -> String {
    hex::encode(Sha256::digest(passphrase.as_bytes()))
}

/// Checks supplied passphrases against a configured digest.
#[derive(Clone)]
pub struct ResetGuard {
    digest: [u8; 32],
}

impl ResetGuard {
    /// Build a guard from a hex-encoded SHA-256 digest.
    pub fn from_hex(digest_hex: &str) -> Result<Self, hex::FromHexError> {
        let mut digest = [0u8; 32];
        hex::decode_to_slice(digest_hex.trim(), &mut digest)?;
        Ok(Self { digest })
    }

    pub fn verify(&self, supplied: &str) -> bool {
        let supplied = Sha256::digest(supplied.as_bytes());
        supplied
            .iter()
            .zip(self.digest.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

impl std::fmt::Debug for ResetGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResetGuard").finish_non_exhaustive()
    }
}
