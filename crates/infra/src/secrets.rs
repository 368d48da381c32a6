//! Generation of client identifiers and client secrets.

use rand::RngCore;
use rand::rngs::OsRng;

/// Length of a generated client identifier, in random bytes.
pub const CLIENT_ID_BYTES: usize = 16;

/// Source of credential material.
///
/// Implementations must return fresh, unpredictable values on every call.
pub trait CredentialGenerator: Send + Sync {
    fn client_id(&self) -> String;

    fn client_secret(&self) -> String;
}

/// Hex-encoded random values drawn from the operating system's CSPRNG.
#[derive(Debug, Clone)]
pub struct OsRngGenerator {
    secret_bytes: usize,
}

impl OsRngGenerator {
    pub fn new(secret_bytes: usize) -> Self {
        Self { secret_bytes }
    }

    fn random_hex(len: usize) -> String {
        let mut bytes = vec![0u8; len];
        OsRng.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

impl Default for OsRngGenerator {
    fn default() -> Self {
        Self::new(32)
    }
}

impl CredentialGenerator for OsRngGenerator {
    fn client_id(&self) -> String {
        Self::random_hex(CLIENT_ID_BYTES)
    }

    fn client_secret(&self) -> String {
        Self::random_hex(self.secret_bytes)
    }
}
