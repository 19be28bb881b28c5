//! Actor-related types and functions.
//!
//! Every mutation of a registry record is committed to that record's Git
//! repository, and the administrative user responsible is recorded as the
//! commit author and in structured trailers. This module defines that actor
//! and its pre-commit validation.

use crate::{RegistryError, RegistryResult};
use hans_types::{EmailAddress, NonEmptyText};

/// The administrative user responsible for a record operation.
#[derive(Clone, Debug)]
pub struct Actor {
    /// Full name of the acting administrator.
    pub name: NonEmptyText,

    /// Email address of the acting administrator.
    pub email: EmailAddress,
}

impl Actor {
    /// Builds an actor from raw strings, validating both fields.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidInput` when the name is empty or
    /// multi-line, or the email address is malformed.
    pub fn new(name: impl AsRef<str>, email: impl AsRef<str>) -> RegistryResult<Self> {
        let name_str = name.as_ref();
        if name_str.contains(['\n', '\r']) {
            return Err(RegistryError::InvalidInput(
                "actor name must be single-line".into(),
            ));
        }
        let name = NonEmptyText::new(name_str)
            .map_err(|_| RegistryError::InvalidInput("actor name must be non-empty".into()))?;
        let email = EmailAddress::parse(email.as_ref())
            .map_err(|e| RegistryError::InvalidInput(format!("invalid actor email: {e}")))?;
        Ok(Self { name, email })
    }

    /// Validate that this actor is usable as a commit author.
    ///
    /// The validated types already guarantee non-empty single-token content;
    /// this re-checks the single-line name invariant for actors constructed
    /// directly from parts.
    pub fn validate_commit_actor(&self) -> RegistryResult<()> {
        if self.name.as_str().contains(['\n', '\r']) {
            return Err(RegistryError::InvalidInput(
                "actor name must be single-line".into(),
            ));
        }
        Ok(())
    }
}
