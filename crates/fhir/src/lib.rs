//! FHIR wire/boundary support for the HANS registry.
//!
//! This crate provides **wire models** and **format/translation helpers** for
//! the two boundaries of the registry:
//! - On-disk, version-controlled record files (YAML): [`Practitioner`] for
//!   registered managers, [`Organization`] for care-provider locations, and
//!   [`CareRecipient`] for care recipients.
//! - HTTP error payloads (JSON): the [`OperationOutcome`] envelope returned by
//!   the pseudonymized search endpoint.
//!
//! This crate focuses on:
//! - FHIR semantic alignment (without FHIR REST transport)
//! - serialisation/deserialisation with strict schemas
//! - translation between domain primitives and wire structs
//!
//! The care-recipient wire model has **no demographic fields**: names and
//! birth dates supplied during CSV import are transient and must never reach
//! storage or any read interface. They are unrepresentable at the wire layer.

pub mod care_recipient;
pub mod operation_outcome;
pub mod organization;
pub mod practitioner;

// Re-export facades
pub use care_recipient::CareRecipient;
pub use organization::Organization;
pub use practitioner::Practitioner;

// Re-export public domain-level types
pub use care_recipient::CareRecipientData;
pub use operation_outcome::{IssueCode, IssueSeverity, OperationOutcome, OutcomeIssue};
pub use organization::OrganizationData;
pub use practitioner::PractitionerData;

/// Errors returned by the `hans-fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("translation error: {0}")]
    Translation(String),

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
