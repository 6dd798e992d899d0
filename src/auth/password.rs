use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand::rngs::OsRng;
use tracing::error;

// Argon2id, 19 MiB, 2 passes, 1 lane.
const MEMORY_KIB: u32 = 19 * 1024;
const PASSES: u32 = 2;
const LANES: u32 = 1;

fn hasher() -> anyhow::Result<Argon2<'static>> {
    let params = Params::new(MEMORY_KIB, PASSES, LANES, None)
        .map_err(|e| anyhow::anyhow!("argon2 params: {e}"))?;
    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// PHC string for `plain`, salted from the OS RNG.
pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let phc = hasher()?
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "password hashing failed");
            anyhow::anyhow!("hash password: {e}")
        })?;
    Ok(phc.to_string())
}

/// Checks `plain` against a stored PHC string. Cost parameters come from the
/// stored hash, so hashes made under older settings still verify.
/// A mismatch is `Ok(false)`; only an unparsable hash is an error.
pub fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| {
        error!(error = %e, "stored password hash unreadable");
        anyhow::anyhow!("parse password hash: {e}")
    })?;
    Ok(hasher()?.verify_password(plain.as_bytes(), &parsed).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_with_configured_argon2id_cost() {
        let hash = hash_password("Testpass123").unwrap();
        assert!(hash.starts_with("$argon2id$v=19$"), "{hash}");
        assert!(hash.contains("m=19456,t=2,p=1"), "{hash}");
        assert!(verify_password("Testpass123", &hash).unwrap());
    }

    #[test]
    fn same_password_gets_distinct_salts() {
        let a = hash_password("Testpass123").unwrap();
        let b = hash_password("Testpass123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn mismatch_is_false_not_error() {
        let hash = hash_password("Testpass123").unwrap();
        assert!(!verify_password("testpass123", &hash).unwrap());
        assert!(!verify_password("", &hash).unwrap());
    }

    #[test]
    fn hash_under_other_cost_still_verifies() {
        let salt = SaltString::generate(&mut OsRng);
        let cheap = Params::new(8 * 1024, 1, 1, None).unwrap();
        let legacy = Argon2::new(Algorithm::Argon2id, Version::V0x13, cheap)
            .hash_password(b"Testpass123", &salt)
            .unwrap()
            .to_string();
        assert!(verify_password("Testpass123", &legacy).unwrap());
    }

    #[test]
    fn unreadable_hash_is_an_error() {
        assert!(verify_password("Testpass123", "plaintext-not-phc").is_err());
    }
}
