//! Short-code generation.

use rand::Rng;

use crate::error::{ServiceError, ServiceResult};
use crate::storage::Storage;

/// Generated codes draw from plain base-62; user-supplied custom codes may
/// additionally contain `-` and `_`.
pub const CODE_ALPHABET: &[u8] =
    b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz";

pub const MIN_CODE_LENGTH: usize = 2;
pub const MAX_CODE_LENGTH: usize = 12;

/// Draw a fixed-length code uniformly from the alphabet. The thread-local
/// RNG is a CSPRNG, which the code space here relies on.
pub fn generate_code(length: usize) -> String {
    let mut rng = rand::rng();
    (0..length)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

/// Generate a code that is unassigned at the moment of issuance, redrawing
/// on collision. With a 62^8 code space collisions are rare enough that an
/// unbounded retry loop terminates in practice after one or two draws.
pub async fn generate_unique_code(storage: &dyn Storage, length: usize) -> ServiceResult<String> {
    loop {
        let code = generate_code(length);
        if !storage.code_exists(&code).await? {
            return Ok(code);
        }
    }
}

/// Validate a user-supplied custom code: 2-12 chars of `[0-9A-Za-z_-]`.
pub fn validate_custom_code(code: &str) -> ServiceResult<()> {
    let valid = (MIN_CODE_LENGTH..=MAX_CODE_LENGTH).contains(&code.len())
        && code
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');

    if valid {
        Ok(())
    } else {
        Err(ServiceError::Validation(
            "Short code must be between 2 and 12 characters and contain only letters, numbers, '-' or '_'."
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_requested_length_and_alphabet() {
        for length in [2, 8, 12] {
            let code = generate_code(length);
            assert_eq!(code.len(), length);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn consecutive_codes_differ() {
        // 62^8 code space; a repeat here means the RNG is broken
        let a = generate_code(8);
        let b = generate_code(8);
        assert_ne!(a, b);
    }

    #[test]
    fn custom_code_validation() {
        assert!(validate_custom_code("ab").is_ok());
        assert!(validate_custom_code("myKey_12").is_ok());
        assert!(validate_custom_code("A-b_C-d_E-f9").is_ok());

        assert!(validate_custom_code("a").is_err());
        assert!(validate_custom_code("toolongtoolong").is_err());
        assert!(validate_custom_code("has space").is_err());
        assert!(validate_custom_code("uml\u{e4}ut").is_err());
        assert!(validate_custom_code("").is_err());
    }
}
