//! Pseudonymized identifier derivation.
//!
//! Care recipients are looked up by a one-way hash of their NHS number. The
//! plaintext number is accepted transiently (during CSV import or direct
//! record creation), validated, hashed, and discarded; only the hash is ever
//! persisted.
//!
//! ## Derivation
//!
//! The pseudonym is the lowercase hex SHA-256 digest of
//! `"<salt>:<normalized number>"`. The same number with the same salt always
//! produces the same digest, which is what makes the hash usable as a lookup
//! key. The salt lives in [`CoreConfig`](crate::CoreConfig) and must stay
//! stable for the lifetime of a registry.
//!
//! ## NHS number validation
//!
//! NHS numbers are 10 digits with a modulus-11 check digit. Spaces are
//! tolerated on input (`943 476 5919`) and stripped before validation.

use crate::{RegistryError, RegistryResult};
use hans_uuid::Sha256Hash;
use sha2::{Digest, Sha256};

/// Validates an NHS number and returns its normalized (digits-only) form.
///
/// # Errors
///
/// Returns `RegistryError::InvalidNhsNumber` if the input is not 10 digits
/// (after stripping spaces) or the modulus-11 check digit does not match.
/// The error never echoes the supplied value.
pub fn validate_nhs_number(input: &str) -> RegistryResult<String> {
    let normalized: String = input.chars().filter(|c| *c != ' ').collect();

    if normalized.len() != 10 || !normalized.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RegistryError::InvalidNhsNumber);
    }

    let digits: Vec<u32> = normalized
        .bytes()
        .map(|b| u32::from(b - b'0'))
        .collect();

    // Modulus-11: weight the first nine digits 10..2, the remainder determines
    // the tenth digit. A computed check of 10 is never valid.
    let sum: u32 = digits[..9]
        .iter()
        .enumerate()
        .map(|(i, d)| d * (10 - i as u32))
        .sum();

    let check = match 11 - (sum % 11) {
        11 => 0,
        10 => return Err(RegistryError::InvalidNhsNumber),
        n => n,
    };

    if digits[9] != check {
        return Err(RegistryError::InvalidNhsNumber);
    }

    Ok(normalized)
}

/// Derives the pseudonymized identifier for an NHS number.
///
/// Validates the number first, then hashes `"<salt>:<digits>"` with SHA-256.
///
/// # Errors
///
/// Returns `RegistryError::InvalidNhsNumber` for an invalid number.
pub fn derive_pseudonym(salt: &str, nhs_number: &str) -> RegistryResult<Sha256Hash> {
    let normalized = validate_nhs_number(nhs_number)?;

    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(normalized.as_bytes());
    let digest = hasher.finalize();

    let hash_hex = hex::encode(digest);
    Ok(Sha256Hash::parse(&hash_hex)?)
}
