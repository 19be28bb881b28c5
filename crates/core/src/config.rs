//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::constants::{
    DEFAULT_PSEUDONYM_SALT, LOCATIONS_DIR_NAME, MANAGERS_DIR_NAME, RECIPIENTS_DIR_NAME,
};
use crate::{RegistryError, RegistryResult};
use hans_types::NonEmptyText;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    registry_data_dir: PathBuf,
    pseudonym_salt: NonEmptyText,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(registry_data_dir: PathBuf, pseudonym_salt: NonEmptyText) -> Self {
        Self {
            registry_data_dir,
            pseudonym_salt,
        }
    }

    pub fn registry_data_dir(&self) -> &Path {
        &self.registry_data_dir
    }

    pub fn managers_dir(&self) -> PathBuf {
        self.registry_data_dir.join(MANAGERS_DIR_NAME)
    }

    pub fn locations_dir(&self) -> PathBuf {
        self.registry_data_dir.join(LOCATIONS_DIR_NAME)
    }

    pub fn recipients_dir(&self) -> PathBuf {
        self.registry_data_dir.join(RECIPIENTS_DIR_NAME)
    }

    /// The salt mixed into pseudonym derivation.
    ///
    /// Lookups only work while the salt stays stable, so this is resolved once
    /// at startup and never re-read.
    pub fn pseudonym_salt(&self) -> &str {
        self.pseudonym_salt.as_str()
    }
}

/// Parse the pseudonym salt from an optional environment value.
///
/// If `value` is `None` or empty/whitespace, returns the development default.
///
/// # Errors
///
/// Returns `RegistryError::InvalidInput` if a supplied salt fails validation.
pub fn pseudonym_salt_from_env_value(value: Option<String>) -> RegistryResult<NonEmptyText> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        Some(v) => NonEmptyText::new(&v)
            .map_err(|e| RegistryError::InvalidInput(format!("invalid pseudonym salt: {e}"))),
        None => NonEmptyText::new(DEFAULT_PSEUDONYM_SALT)
            .map_err(|e| RegistryError::InvalidInput(format!("invalid default salt: {e}"))),
    }
}
