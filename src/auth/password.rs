//! Salted PBKDF2-HMAC-SHA256 password hashes.
//!
//! Stored form: `pbkdf2:sha256:<iterations>$<salt>$<base64 digest>`. The
//! iteration count travels with the hash, so lowering it for tests or raising
//! it later does not invalidate existing rows.

use base64::{engine::general_purpose::STANDARD_NO_PAD as BASE64, Engine};
use rand::{distributions::Alphanumeric, Rng};
use sha2::Sha256;

const METHOD: &str = "pbkdf2:sha256";
const SALT_LENGTH: usize = 10;
const DIGEST_SIZE: usize = 32;
pub const DEFAULT_ITERATIONS: u32 = 600_000;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_ITERATIONS)
    }
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self {
        Self { iterations: iterations.max(1) }
    }

    pub fn hash(&self, password: &str) -> String {
        let salt: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SALT_LENGTH)
            .map(char::from)
            .collect();
        let digest = derive(password, &salt, self.iterations);
        format!("{}:{}${}${}", METHOD, self.iterations, salt, BASE64.encode(digest))
    }
}

/// Check `password` against a stored hash. Malformed hashes never match.
pub fn verify_password(stored: &str, password: &str) -> bool {
    let Some((method, rest)) = stored.split_once('$') else {
        return false;
    };
    let Some((salt, encoded)) = rest.split_once('$') else {
        return false;
    };
    let Some(iterations) = method
        .strip_prefix(METHOD)
        .and_then(|s| s.strip_prefix(':'))
        .and_then(|s| s.parse::<u32>().ok())
    else {
        return false;
    };
    let Ok(expected) = BASE64.decode(encoded) else {
        return false;
    };

    let actual = derive(password, salt, iterations);
    constant_time_eq(&actual, &expected)
}

fn derive(password: &str, salt: &str, iterations: u32) -> [u8; DIGEST_SIZE] {
    let mut out = [0u8; DIGEST_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt.as_bytes(), iterations, &mut out);
    out
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

    #[test]
    fn test_hash_and_verify() {
        let hasher = PasswordHasher::new(1_000);
        let hash = hasher.hash("123toby");

        assert!(hash.starts_with("pbkdf2:sha256:1000$"));
        assert!(verify_password(&hash, "123toby"));
        assert!(!verify_password(&hash, "123niko"));
    }

    #[test]
    fn test_salt_differs_per_hash() {
        let hasher = PasswordHasher::new(1_000);
        let first = hasher.hash("123qwerty");
        let second = hasher.hash("123qwerty");

        assert_ne!(first, second);
        assert!(verify_password(&first, "123qwerty"));
        assert!(verify_password(&second, "123qwerty"));
    }

    #[test]
    fn test_malformed_hash_rejected() {
        assert!(!verify_password("", "anything"));
        assert!(!verify_password("plaintext", "plaintext"));
        assert!(!verify_password("md5:1000$salt$abc", "abc"));
        assert!(!verify_password("pbkdf2:sha256:lots$salt$abc", "abc"));
        assert!(!verify_password("pbkdf2:sha256:10$salt$***", "abc"));
    }
}
