//! Credential checks for LOGIN and REGISTER.
//!
//! Passwords are stored as `hex(salt)$hex(sha256(salt || password))`.
//! Hashing happens server-side; clients send the plaintext over the
//! connection and never see the stored form.

use crate::store::JsonStore;
use hubbub_core::RelayResult;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

/// Outcome of a registration attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum RegisterOutcome {
    Created,
    AlreadyExists,
}

/// Validate `password` for `username` against the credential store.
///
/// An unknown username is a plain rejection, never a panic.
pub fn login(store: &JsonStore, username: &str, password: &str) -> bool {
    match store.user_hash(username) {
        Some(stored) => verify_password(password, stored),
        None => {
            warn!(username = %username, "login for unknown user");
            false
        }
    }
}

/// Register a new user, persisting the hashed credential.
///
/// Re-registration of an existing username is rejected; the prior
/// credential is never overwritten.
pub fn register(
    store: &mut JsonStore,
    username: &str,
    password: &str,
) -> RelayResult<RegisterOutcome> {
    if store.has_user(username) {
        return Ok(RegisterOutcome::AlreadyExists);
    }
    store.insert_user(username.to_string(), hash_password(password))?;
    info!(username = %username, "user registered");
    Ok(RegisterOutcome::Created)
}

/// Hash a password with a fresh random 16-byte salt.
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    format!("{}${}", hex::encode(salt), hex::encode(digest(&salt, password)))
}

/// Verify a password against a stored `salt$hash` string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, hash_hex)) = stored.split_once('$') else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt_hex), hex::decode(hash_hex)) else {
        return false;
    };
    constant_time_eq(&digest(&salt, password), &expected)
}

fn digest(salt: &[u8], password: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    hasher.finalize().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path()).unwrap();
        (dir, store)
    }

    #[test]
    fn register_then_login_succeeds() {
        let (_dir, mut store) = temp_store();
        assert_eq!(
            register(&mut store, "alice", "pw1").unwrap(),
            RegisterOutcome::Created
        );
        assert!(login(&store, "alice", "pw1"));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let (_dir, mut store) = temp_store();
        register(&mut store, "alice", "pw1").unwrap();
        assert!(!login(&store, "alice", "pw2"));
    }

    #[test]
    fn unknown_user_is_rejected() {
        let (_dir, store) = temp_store();
        assert!(!login(&store, "nobody", "pw"));
    }

    #[test]
    fn duplicate_register_is_rejected() {
        let (_dir, mut store) = temp_store();
        register(&mut store, "alice", "pw1").unwrap();
        assert_eq!(
            register(&mut store, "alice", "pw2").unwrap(),
            RegisterOutcome::AlreadyExists
        );
        // Original credential still valid.
        assert!(login(&store, "alice", "pw1"));
        assert!(!login(&store, "alice", "pw2"));
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("pw");
        let b = hash_password("pw");
        assert_ne!(a, b);
        assert!(verify_password("pw", &a));
        assert!(verify_password("pw", &b));
    }

    #[test]
    fn malformed_stored_hash_rejects() {
        assert!(!verify_password("pw", "no-dollar-sign"));
        assert!(!verify_password("pw", "zz$zz"));
    }
}
