use std::num::NonZeroU32;

use base64::engine::general_purpose::STANDARD_NO_PAD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, pbkdf2};

const SCHEME: &str = "pbkdf2-sha256";
const ITERATIONS: NonZeroU32 = match NonZeroU32::new(100_000) {
    Some(n) => n,
    None => panic!("iteration count must be non-zero"),
};
const SALT_LEN: usize = 16;

/// Hash a password as `pbkdf2-sha256$<iterations>$<salt>$<hash>`.
pub fn hash_password(password: &str) -> Result<String, ring::error::Unspecified> {
    let mut salt = [0u8; SALT_LEN];
    SystemRandom::new().fill(&mut salt)?;

    let mut hash = [0u8; digest::SHA256_OUTPUT_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        ITERATIONS,
        &salt,
        password.as_bytes(),
        &mut hash,
    );

    Ok(format!(
        "{SCHEME}${}${}${}",
        ITERATIONS,
        STANDARD_NO_PAD.encode(salt),
        STANDARD_NO_PAD.encode(hash)
    ))
}

/// Constant-time check of `password` against a stored hash string.
/// Unparseable hashes never match.
pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut fields = encoded.split('$');
    let (Some(SCHEME), Some(iterations), Some(salt), Some(hash), None) = (
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
        fields.next(),
    ) else {
        tracing::warn!("Stored password hash has an unknown format");
        return false;
    };

    let Some(iterations) = iterations.parse().ok().and_then(NonZeroU32::new) else {
        return false;
    };
    let (Ok(salt), Ok(hash)) = (STANDARD_NO_PAD.decode(salt), STANDARD_NO_PAD.decode(hash)) else {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_then_verify() {
        let hash = hash_password("pw123456").unwrap();
        assert!(hash.starts_with("pbkdf2-sha256$100000$"));
        assert!(verify_password("pw123456", &hash));
        assert!(!verify_password("pw1234567", &hash));
    }

    #[test]
    fn salts_differ() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_hash_never_matches() {
        assert!(!verify_password("pw", ""));
        assert!(!verify_password("pw", "pbkdf2-sha256$0$AAAA$AAAA"));
        assert!(!verify_password("pw", "bcrypt$10$abc$def"));
    }
}
