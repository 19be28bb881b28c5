//! # HANS Core
//!
//! Core business logic for the HANS management interface registry.
//!
//! This crate contains pure data operations and file/folder management:
//! - Registered-manager, care-provider-location, and care-recipient record
//!   creation, reading, and listing with sharded YAML storage
//! - Git-based audit versioning of every record directory
//! - Pseudonym derivation (salted SHA-256 of validated NHS numbers)
//! - Bulk CSV import with per-row error accumulation
//! - The subscription-client seam to the external notification system
//!
//! **No API concerns**: authentication, HTTP servers, or OpenAPI surfaces
//! belong in the `hans-run` binary and `hans-cli`.

pub mod actor;
pub mod config;
pub mod constants;
pub mod error;
pub mod import;
pub mod pseudonym;
pub mod registry;
pub mod subscription;
pub mod versioned;

pub use actor::Actor;
pub use config::{pseudonym_salt_from_env_value, CoreConfig};
pub use error::{RegistryError, RegistryResult};
pub use import::{CsvImportService, ImportError, ImportSummary, RowError, EXPECTED_COLUMNS};
pub use pseudonym::{derive_pseudonym, validate_nhs_number};
pub use registry::locations::{LocationService, NewCareProviderLocation};
pub use registry::managers::{ManagerService, NewRegisteredManager};
pub use registry::recipients::{NewCareRecipient, RecipientService};
pub use subscription::{
    HttpSubscriptionClient, LocalSubscriptionIssuer, SubscriptionError, SubscriptionService,
};

// Re-export the boundary types services hand back to callers.
pub use hans_fhir::{CareRecipientData, OrganizationData, PractitionerData};
pub use hans_types::{EmailAddress, NonEmptyText};
pub use hans_uuid::{RecordUuid, Sha256Hash};
