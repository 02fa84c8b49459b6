//! Identity-field hashing for Meta CAPI.
//!
//! Meta requires PII to be normalized and SHA-256 hashed before it leaves
//! the sender. Each identity field belongs to one of three normalization
//! classes; the digest is always the lowercase hex encoding, and a field
//! that is empty after normalization is omitted entirely — never sent as
//! a hash of the empty string.

use sha2::{Digest, Sha256};

/// How a raw identity value is normalized before hashing.
///
/// Per Meta's customer-information-parameter rules:
/// - email, names, gender, city, state, country: lowercase + trim
/// - phone: digits only
/// - zip, birth date, external id: passed as-is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    LowercaseTrim,
    DigitsOnly,
    AsIs,
}

/// Normalize and hash one identity field.
///
/// Returns `None` when the input is empty or whitespace-only (the field
/// must then be omitted from `user_data`), otherwise the 64-char lowercase
/// hex SHA-256 digest of the normalized value. Deterministic, no salt.
pub fn hash_identity_field(norm: Normalization, raw: &str) -> Option<String> {
    let normalized = match norm {
        Normalization::LowercaseTrim => raw.trim().to_lowercase(),
        Normalization::DigitsOnly => raw.chars().filter(|c| c.is_ascii_digit()).collect(),
        // Emptiness is still judged on the trimmed value so a whitespace-only
        // zip/birth date is dropped rather than hashed.
        Normalization::AsIs => {
            if raw.trim().is_empty() {
                String::new()
            } else {
                raw.to_string()
            }
        }
    };

    if normalized.is_empty() {
        return None;
    }
    Some(hex_sha256(&normalized))
}

/// Lowercase hex SHA-256 of a string.
pub fn hex_sha256(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
