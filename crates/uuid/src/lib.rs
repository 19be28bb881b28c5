//! Identifier and sharded-path utilities.
//!
//! HANS stores registry records under sharded directories derived from a record
//! identifier. To keep path derivation deterministic and consistent across the
//! codebase, HANS uses a *canonical* UUID representation for storage
//! identifiers: **32 lowercase hexadecimal characters** (no hyphens).
//!
//! This crate provides:
//! - A wrapper type ([`RecordUuid`]) that *guarantees* the canonical format once
//!   constructed, plus the shared sharding logic used to derive record
//!   directory locations.
//! - A wrapper type ([`Sha256Hash`]) for lowercase hex SHA-256 digests, used as
//!   pseudonymized patient identifiers.
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Notes:
//! - This is the same value you would get from `Uuid::new_v4().simple().to_string()`.
//! - Canonical form is *required* for externally supplied identifiers (for
//!   example, from CLI/API inputs). Use [`RecordUuid::parse`] to validate an
//!   input string. Non-canonical values (uppercase, hyphenated, wrong length,
//!   non-hex) are rejected.
//!
//! ## Sharded directory layout
//! For a canonical UUID `u`, HANS stores data under:
//! `parent_dir/<u[0..2]>/<u[2..4]>/<u>/`
//!
//! Example:
//! `registry_data/locations/55/0e/550e8400e29b41d4a716446655440000/`
//!
//! This scheme prevents very large fan-out in a single directory.

use std::path::{Path, PathBuf};
use std::{fmt, str::FromStr};

/// Re-exported for convenience.
pub use ::uuid::Uuid;

/// Error type for identifier operations.
#[derive(Debug, thiserror::Error)]
pub enum UuidError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type UuidResult<T> = Result<T, UuidError>;

/// HANS's canonical record identifier (32 lowercase hex characters, no hyphens).
///
/// Once constructed, the contained UUID is guaranteed to be in canonical form.
/// Use this wrapper whenever you are:
/// - Accepting an identifier string from *outside* the core (CLI input, API
///   request, etc),
/// - Deriving a sharded storage path for a record, or
/// - Generating new record identifiers.
///
/// # Construction
/// - [`RecordUuid::new`] generates a new canonical UUID (for new records).
/// - [`RecordUuid::parse`] validates an externally supplied identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RecordUuid(Uuid);

impl Default for RecordUuid {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordUuid {
    /// Generates a new identifier in canonical form.
    ///
    /// Suitable for allocating a fresh identifier during record creation.
    /// The generated UUID follows RFC 4122 version 4.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Validates and parses an identifier that must already be in canonical form.
    ///
    /// This does **not** normalise other common UUID forms (for example,
    /// hyphenated or uppercase). Callers must provide the canonical
    /// representation.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not in canonical form.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if Self::is_canonical(input) {
            // SAFETY: is_canonical guarantees valid hex, so parse_str will succeed
            let uuid = Uuid::parse_str(input).expect("is_canonical guarantees valid UUID");
            return Ok(Self(uuid));
        }
        Err(UuidError::InvalidInput(format!(
            "record identifier must be 32 lowercase hex characters without hyphens, got: '{}'",
            input
        )))
    }

    /// Returns the identifier as a `uuid::Uuid`.
    pub fn uuid(&self) -> Uuid {
        self.0
    }

    /// Returns true if `input` is in canonical form.
    ///
    /// This is a purely syntactic check:
    /// - Exactly 32 bytes long
    /// - Contains only lowercase hex characters (`0-9` and `a-f`)
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 32
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns `parent_dir/<s1>/<s2>/<uuid>/` where `s1`/`s2` are derived from this UUID.
    ///
    /// This implements HANS's sharding scheme:
    /// - `s1` is the first two hex characters of the UUID
    /// - `s2` is the next two hex characters
    /// - The full UUID forms the leaf directory
    ///
    /// # Arguments
    ///
    /// * `parent_dir` - Base directory under which to shard the UUID.
    pub fn sharded_dir(&self, parent_dir: &Path) -> PathBuf {
        let canonical = self.0.simple().to_string();
        let s1 = &canonical[0..2];
        let s2 = &canonical[2..4];
        parent_dir.join(s1).join(s2).join(&canonical)
    }
}

impl fmt::Display for RecordUuid {
    /// Formats the identifier in canonical form (32 lowercase hex characters, no hyphens).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

impl FromStr for RecordUuid {
    type Err = UuidError;

    /// Parses a string into a `RecordUuid`, requiring canonical form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RecordUuid::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RecordUuid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RecordUuid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        RecordUuid::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// A lowercase-hex SHA-256 digest.
///
/// HANS uses SHA-256 digests as pseudonymized patient identifiers: a one-way
/// hash derived from a national identifier, usable as a lookup key without
/// storing or exposing the original value. This wrapper guarantees the
/// canonical textual form once constructed:
///
/// - Length: 64
/// - Characters: `0-9` and `a-f` only
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Sha256Hash(String);

impl Sha256Hash {
    /// Validates and wraps a lowercase hex SHA-256 digest string.
    ///
    /// # Errors
    ///
    /// Returns [`UuidError::InvalidInput`] if `input` is not 64 lowercase hex
    /// characters.
    pub fn parse(input: &str) -> UuidResult<Self> {
        if Self::is_canonical(input) {
            return Ok(Self(input.to_owned()));
        }
        Err(UuidError::InvalidInput(
            "SHA-256 digest must be 64 lowercase hex characters".into(),
        ))
    }

    /// Returns true if `input` is a canonical lowercase hex SHA-256 digest.
    pub fn is_canonical(input: &str) -> bool {
        input.len() == 64
            && input
                .bytes()
                .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    }

    /// Returns the digest as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Sha256Hash {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Sha256Hash::parse(s)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Sha256Hash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Sha256Hash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Sha256Hash::parse(&s).map_err(serde::de::Error::custom)
    }
}
