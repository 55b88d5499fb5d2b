//! Salted password digests and random tokens.

use rand::RngCore;
use sha2::{Digest, Sha256};
use storage::repository::Credential;

const SALT_BYTES: usize = 16;
const TOKEN_BYTES: usize = 32;

fn random_hex(len: usize) -> String {
    let mut buf = vec![0u8; len];
    rand::rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Hashes `password` under a fresh salt.
#[must_use]
pub fn new_credential(password: &str) -> Credential {
    let salt = random_hex(SALT_BYTES);
    let digest = digest(&salt, password);
    Credential { salt, digest }
}

#[must_use]
pub fn verify(credential: &Credential, password: &str) -> bool {
    digest(&credential.salt, password) == credential.digest
}

/// Opaque bearer or upload token.
#[must_use]
pub fn new_token() -> String {
    random_hex(TOKEN_BYTES)
}
