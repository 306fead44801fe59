//! Random identifier generation.
//!
//! Identifiers are drawn from `[0-9A-Za-z]` using the operating system's
//! CSPRNG. Uniqueness is statistical only; no collision detection is done.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Length of collection and record identifiers
pub const ITEM_ID_LEN: usize = 16;

/// Length of the random suffix used to disambiguate bucket writes
pub const SUFFIX_LEN: usize = 24;

/// Returns a string of `len` characters drawn uniformly from `[0-9A-Za-z]`.
///
/// # Examples
///
/// ```
/// use settingsdb_core::id;
///
/// let id = id::generate(16);
/// assert_eq!(id.len(), 16);
/// assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
/// ```
pub fn generate(len: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_length_and_alphabet() {
        for len in [0, 1, ITEM_ID_LEN, SUFFIX_LEN, 128] {
            let id = generate(len);
            assert_eq!(id.len(), len);
            assert!(id.bytes().all(|b| b.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_generate_distinct() {
        let a = generate(ITEM_ID_LEN);
        let b = generate(ITEM_ID_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn test_generate_covers_alphabet_classes() {
        // 4096 draws make a miss of any class astronomically unlikely
        let sample = generate(4096);
        assert!(sample.bytes().any(|b| b.is_ascii_digit()));
        assert!(sample.bytes().any(|b| b.is_ascii_uppercase()));
        assert!(sample.bytes().any(|b| b.is_ascii_lowercase()));
    }
}
