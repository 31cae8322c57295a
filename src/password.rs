//! Password verifiers
//!
//! Share passwords and account passwords are stored as salted
//! PBKDF2-HMAC-SHA256 digests, never as plaintext. Storage form is
//! `hex(salt)$hex(digest)`.

use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;

const SALT_LEN: usize = 16;
const DIGEST_LEN: usize = 32;
const PBKDF2_ROUNDS: u32 = 10_000;

/// Derive a stored verifier for a password with a fresh random salt
pub fn hash_password(password: &str) -> String {
    let mut salt = [0u8; SALT_LEN];
    getrandom::getrandom(&mut salt).expect("failed to generate random bytes");

    let digest = derive(password, &salt);
    format!("{}${}", hex::encode(salt), hex::encode(digest))
}

/// Check a password against a stored verifier.
///
/// Malformed stored values verify as false. The digest comparison folds the
/// whole difference before branching, so match position does not change its
/// timing.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let Some((salt_hex, digest_hex)) = stored.split_once('$') else {
        return false;
    };
    let Ok(salt) = hex::decode(salt_hex) else {
        return false;
    };
    let Ok(expected) = hex::decode(digest_hex) else {
        return false;
    };

    let actual = derive(password, &salt);
    digests_match(&actual, &expected)
}

fn derive(password: &str, salt: &[u8]) -> [u8; DIGEST_LEN] {
    let mut digest = [0u8; DIGEST_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ROUNDS, &mut digest);
    digest
}

fn digests_match(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b) {
        diff |= x ^ y;
    }
    diff == 0
}
