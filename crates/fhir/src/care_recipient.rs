//! FHIR-aligned wire model for care recipients.
//!
//! A care recipient is stored on disk as a Patient resource that carries
//! **identifiers only**:
//!
//! - the pseudonymized national identifier (a one-way SHA-256 hash),
//! - the subscription correlation ID issued by the external subscription
//!   system,
//! - the provider-assigned reference ID, and
//! - the owning care-provider-location record.
//!
//! There are no name or birth-date fields in this wire model. Demographic
//! values supplied during CSV import exist only transiently in the import
//! pipeline; a file containing them fails strict parsing, so they can never
//! round-trip through storage or any read interface.

use crate::practitioner::MetaWire;
use crate::FhirError;
use chrono::{DateTime, Utc};
use hans_uuid::{RecordUuid, Sha256Hash};
use serde::{Deserialize, Serialize};

/// Domain-level carrier for care-recipient data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CareRecipientData {
    /// Unique identifier for this care-recipient record.
    pub id: RecordUuid,

    /// One-way hash of the national identifier. Used as the search key.
    pub nhs_number_hash: Sha256Hash,

    /// Opaque token correlating to the external subscription system.
    pub subscription_id: String,

    /// Provider-assigned reference identifier.
    pub provider_reference_id: String,

    /// Identifier of the owning care-provider-location record.
    pub location_id: RecordUuid,

    /// Last updated timestamp.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Care-recipient resource operations.
pub struct CareRecipient;

impl CareRecipient {
    /// Parse a care-recipient resource from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on schema mismatch, unknown keys (including any
    /// demographic field), a wrong resourceType, or invalid identifiers.
    pub fn parse(yaml_text: &str) -> Result<CareRecipientData, FhirError> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, CareRecipientWire>(deserializer) {
            Ok(parsed) => parsed,
            Err(err) => {
                let path = err.path().to_string();
                let source = err.into_inner();
                let path = if path.is_empty() {
                    "<root>"
                } else {
                    path.as_str()
                };
                return Err(FhirError::Translation(format!(
                    "CareRecipient schema mismatch at {path}: {source}"
                )));
            }
        };

        if wire.resource_type != "Patient" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Patient', got '{}'",
                wire.resource_type
            )));
        }

        let id = RecordUuid::parse(&wire.id)
            .map_err(|e| FhirError::InvalidIdentifier(format!("Invalid care-recipient ID: {e}")))?;
        let location_id = RecordUuid::parse(&wire.location_id)
            .map_err(|e| FhirError::InvalidIdentifier(format!("Invalid location ID: {e}")))?;
        let nhs_number_hash = Sha256Hash::parse(&wire.nhs_number_hash)
            .map_err(|e| FhirError::InvalidIdentifier(format!("Invalid pseudonym hash: {e}")))?;

        let last_updated = wire
            .meta
            .and_then(|m| m.last_updated)
            .and_then(|s| s.parse::<DateTime<Utc>>().ok());

        Ok(CareRecipientData {
            id,
            nhs_number_hash,
            subscription_id: wire.subscription_id,
            provider_reference_id: wire.provider_reference_id,
            location_id,
            last_updated,
        })
    }

    /// Render a care-recipient resource as YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if serialisation fails.
    pub fn render(data: &CareRecipientData) -> Result<String, FhirError> {
        let wire = CareRecipientWire {
            resource_type: "Patient".to_string(),
            id: data.id.to_string(),
            nhs_number_hash: data.nhs_number_hash.to_string(),
            subscription_id: data.subscription_id.clone(),
            provider_reference_id: data.provider_reference_id.clone(),
            location_id: data.location_id.to_string(),
            meta: data.last_updated.map(|lu| MetaWire {
                last_updated: Some(lu.to_rfc3339()),
            }),
        };
        serde_yaml::to_string(&wire)
            .map_err(|e| FhirError::Translation(format!("Failed to serialise care recipient: {e}")))
    }
}

/// Wire representation of a care-recipient resource for on-disk YAML.
///
/// Identifiers only. `deny_unknown_fields` makes demographic keys a parse
/// error rather than silently tolerated data.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct CareRecipientWire {
    #[serde(rename = "resourceType")]
    pub resource_type: String,

    pub id: String,

    #[serde(rename = "nhsNumberHash")]
    pub nhs_number_hash: String,

    #[serde(rename = "subscriptionId")]
    pub subscription_id: String,

    #[serde(rename = "providerReferenceId")]
    pub provider_reference_id: String,

    #[serde(rename = "locationId")]
    pub location_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaWire>,
}
