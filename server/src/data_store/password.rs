//! Password hashing with PBKDF2-HMAC-SHA256
//!
//! Hashes are stored in the self-describing format
//! `pbkdf2-sha256$<iterations>$<salt base64>$<hash base64>`, so the iteration count can be raised
//! later without invalidating existing passwords.

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use ring::rand::SecureRandom;
use ring::{digest, pbkdf2};
use std::num::NonZeroU32;

const SCHEME: &str = "pbkdf2-sha256";
const ITERATIONS: u32 = 100_000;
const SALT_LENGTH: usize = 16;
const HASH_LENGTH: usize = digest::SHA256_OUTPUT_LEN;

pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let iterations = NonZeroU32::new(ITERATIONS).ok_or(PasswordError::InvalidHashFormat)?;
    let mut salt = [0u8; SALT_LENGTH];
    ring::rand::SystemRandom::new()
        .fill(&mut salt)
        .map_err(|_| PasswordError::RandomGeneratorFailed)?;
    let mut hash = [0u8; HASH_LENGTH];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        &mut hash,
    );
    Ok(format!(
        "{}${}${}${}",
        SCHEME,
        iterations,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    ))
}

/// Check `password` against a hash created by [hash_password].
///
/// Malformed hashes never match.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    let Ok((iterations, salt, hash)) = parse_hash(password_hash) else {
        return false;
    };
    pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        &hash,
    )
    .is_ok()
}

fn parse_hash(password_hash: &str) -> Result<(NonZeroU32, Vec<u8>, Vec<u8>), PasswordError> {
    let parts: Vec<&str> = password_hash.split('$').collect();
    let &[scheme, iterations, salt, hash] = parts.as_slice() else {
        return Err(PasswordError::InvalidHashFormat);
    };
    if scheme != SCHEME {
        return Err(PasswordError::InvalidHashFormat);
    }
    let iterations = iterations
        .parse::<NonZeroU32>()
        .map_err(|_| PasswordError::InvalidHashFormat)?;
    let salt = STANDARD_NO_PAD
        .decode(salt)
        .map_err(|_| PasswordError::InvalidHashFormat)?;
    let hash = STANDARD_NO_PAD
        .decode(hash)
        .map_err(|_| PasswordError::InvalidHashFormat)?;
    Ok((iterations, salt, hash))
}

#[derive(Debug, PartialEq, Eq)]
pub enum PasswordError {
    RandomGeneratorFailed,
    InvalidHashFormat,
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PasswordError::RandomGeneratorFailed => f.write_str("Could not generate random salt"),
            PasswordError::InvalidHashFormat => f.write_str("Invalid password hash format"),
        }
    }
}

impl std::error::Error for PasswordError {}
