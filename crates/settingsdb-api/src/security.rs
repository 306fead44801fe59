//! Input validation for collection operations
//!
//! Names end up as engine table names, bucket keys and snapshot file names,
//! so they are checked before they reach storage.

use settingsdb_core::error::{Error, Result};
use settingsdb_storage::SEQUENCE_TABLE;

/// Validates a collection (bucket) name
///
/// # Security
///
/// - Prevents empty names
/// - Prevents oversized names (>256 bytes)
/// - Prevents path traversal through snapshot file names
/// - Prevents null bytes
/// - Rejects the reserved sequence table name
///
/// # Errors
///
/// Returns Error::InvalidInput if validation fails
#[inline]
pub fn validate_collection_name(name: &str) -> Result<()> {
    const MAX_COLLECTION_NAME_LENGTH: usize = 256;

    if name.is_empty() {
        return Err(Error::InvalidInput(
            "Collection name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_COLLECTION_NAME_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Collection name length {} exceeds maximum {}",
            name.len(),
            MAX_COLLECTION_NAME_LENGTH
        )));
    }

    if name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(Error::InvalidInput(
            "Collection name cannot contain path separators or '..'".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(Error::InvalidInput(
            "Collection name cannot contain null bytes".to_string(),
        ));
    }

    if name == SEQUENCE_TABLE {
        return Err(Error::InvalidInput(format!(
            "Collection name '{}' is reserved",
            name
        )));
    }

    Ok(())
}

/// Validates an item name
///
/// # Security
///
/// - Prevents empty names
/// - Prevents oversized names (>64KB)
/// - Prevents null bytes
///
/// # Errors
///
/// Returns Error::InvalidInput if validation fails
#[inline]
pub fn validate_item_name(name: &str) -> Result<()> {
    const MAX_ITEM_NAME_LENGTH: usize = 64 * 1024;

    if name.is_empty() {
        return Err(Error::InvalidInput("Item name cannot be empty".to_string()));
    }

    if name.len() > MAX_ITEM_NAME_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Item name length {} exceeds maximum {}",
            name.len(),
            MAX_ITEM_NAME_LENGTH
        )));
    }

    if name.contains('\0') {
        return Err(Error::InvalidInput(
            "Item name cannot contain null bytes".to_string(),
        ));
    }

    Ok(())
}

/// Validates an entry key
///
/// # Errors
///
/// Returns Error::InvalidInput if the key is empty
#[inline]
pub fn validate_entry_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidInput("Entry key cannot be empty".to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_collection_name() {
        // Valid
        assert!(validate_collection_name("themes").is_ok());
        assert!(validate_collection_name("user settings").is_ok());

        // Empty
        assert!(validate_collection_name("").is_err());

        // Path traversal
        assert!(validate_collection_name("../etc/passwd").is_err());
        assert!(validate_collection_name("path/to/file").is_err());

        // Reserved
        assert!(validate_collection_name(SEQUENCE_TABLE).is_err());

        // Too long
        assert!(validate_collection_name(&"a".repeat(257)).is_err());
    }

    #[test]
    fn test_validate_item_name() {
        assert!(validate_item_name("theme").is_ok());
        assert!(validate_item_name("a/b").is_ok());
        assert!(validate_item_name("").is_err());
        assert!(validate_item_name("nul\0byte").is_err());
        assert!(validate_item_name(&"x".repeat(65 * 1024)).is_err());
    }

    #[test]
    fn test_validate_entry_key() {
        assert!(validate_entry_key("mode").is_ok());
        assert!(validate_entry_key("").is_err());
    }
}
