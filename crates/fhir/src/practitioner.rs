//! FHIR-aligned wire model for registered managers.
//!
//! A registered manager is the individual responsible for a care-provider
//! organisation, per the external regulator's registration. It is stored on
//! disk as a Practitioner resource.
//!
//! Responsibilities:
//! - Define the public domain-level type for service use
//! - Define a strict wire model for serialisation/deserialisation
//! - Provide translation helpers between domain primitives and the wire model
//!
//! Notes:
//! - The manager file is mutable and overwriteable
//! - Changes are git-audited by the registry services

use crate::FhirError;
use chrono::{DateTime, Utc};
use hans_uuid::RecordUuid;
use serde::{Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

/// Domain-level carrier for registered-manager data (flat structure).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PractitionerData {
    /// Unique identifier for this manager record.
    pub id: RecordUuid,

    /// Given (first) name.
    pub given_name: String,

    /// Family name (surname).
    pub family_name: String,

    /// CQC registered-manager identifier. Unique across the registry.
    pub cqc_registered_manager_id: String,

    /// Last updated timestamp.
    pub last_updated: Option<DateTime<Utc>>,
}

// ============================================================================
// Public Practitioner operations
// ============================================================================

/// Registered-manager resource operations.
///
/// Zero-sized type used for namespacing; all methods are associated functions.
pub struct Practitioner;

impl Practitioner {
    /// Parse a manager resource from YAML text.
    ///
    /// Uses `serde_path_to_error` to surface a best-effort "path" (e.g.
    /// `name.family`) to the failing field when the YAML does not match the
    /// wire schema.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - the YAML does not represent a valid Practitioner resource,
    /// - any field has an unexpected type,
    /// - any unknown keys are present (due to `#[serde(deny_unknown_fields)]`),
    /// - resourceType is not "Practitioner".
    pub fn parse(yaml_text: &str) -> Result<PractitionerData, FhirError> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, PractitionerWire>(deserializer) {
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
                    "Practitioner schema mismatch at {path}: {source}"
                )));
            }
        };

        if wire.resource_type != "Practitioner" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Practitioner', got '{}'",
                wire.resource_type
            )));
        }

        let id = RecordUuid::parse(&wire.id)
            .map_err(|e| FhirError::InvalidIdentifier(format!("Invalid manager ID: {e}")))?;

        let last_updated = wire
            .meta
            .and_then(|m| m.last_updated)
            .and_then(|s| s.parse::<DateTime<Utc>>().ok());

        Ok(PractitionerData {
            id,
            given_name: wire.name.given,
            family_name: wire.name.family,
            cqc_registered_manager_id: wire.cqc_registered_manager_id,
            last_updated,
        })
    }

    /// Render a manager resource as YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if serialisation fails.
    pub fn render(data: &PractitionerData) -> Result<String, FhirError> {
        let wire = PractitionerWire {
            resource_type: "Practitioner".to_string(),
            id: data.id.to_string(),
            name: HumanNameWire {
                family: data.family_name.clone(),
                given: data.given_name.clone(),
            },
            cqc_registered_manager_id: data.cqc_registered_manager_id.clone(),
            meta: data.last_updated.map(|lu| MetaWire {
                last_updated: Some(lu.to_rfc3339()),
            }),
        };
        serde_yaml::to_string(&wire)
            .map_err(|e| FhirError::Translation(format!("Failed to serialise manager: {e}")))
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

/// Wire representation of a manager resource for on-disk YAML.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct PractitionerWire {
    #[serde(rename = "resourceType")]
    pub resource_type: String,

    pub id: String,

    pub name: HumanNameWire,

    #[serde(rename = "cqcRegisteredManagerId")]
    pub cqc_registered_manager_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaWire>,
}

/// Wire representation of a human name.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct HumanNameWire {
    pub family: String,
    pub given: String,
}

/// Wire representation of resource metadata.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub(crate) struct MetaWire {
    #[serde(rename = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}
