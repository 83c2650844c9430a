use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

pub const PBKDF2_ITERATIONS: u32 = 600_000;
pub const HASH_LENGTH: usize = 32;
pub const SALT_LENGTH: usize = 16;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Username already exists: {0}")]
    UsernameTaken(String),

    #[error("Passwords do not match")]
    PasswordMismatch,

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Login required")]
    NotAuthenticated,

    #[error("Corrupted credential record for {0}")]
    CorruptedRecord(String),
}

/// Salted PBKDF2-HMAC-SHA256 password hash, hex encoded for storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub hash: String,
    pub salt: String,
    pub iterations: u32,
}

impl PasswordHash {
    /// Hash `password` with a fresh random salt
    pub fn create(password: &str, iterations: u32) -> Self {
        let mut salt = [0u8; SALT_LENGTH];
        rand::thread_rng().fill_bytes(&mut salt);
        let hash = derive(password, &salt, iterations);
        Self {
            hash: hex::encode(hash),
            salt: hex::encode(salt),
            iterations,
        }
    }

    /// Constant-time check of `password` against this hash
    pub fn verify(&self, password: &str) -> Result<bool, AuthError> {
        let salt = hex::decode(&self.salt).map_err(|_| AuthError::CorruptedRecord(self.salt.clone()))?;
        let expected = hex::decode(&self.hash).map_err(|_| AuthError::CorruptedRecord(self.hash.clone()))?;
        let actual = derive(password, &salt, self.iterations);
        Ok(actual.as_slice().ct_eq(expected.as_slice()).into())
    }
}

fn derive(password: &str, salt: &[u8], iterations: u32) -> [u8; HASH_LENGTH] {
    let mut out = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut out);
    out
}
