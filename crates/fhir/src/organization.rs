//! FHIR-aligned wire model for care-provider locations.
//!
//! A care-provider location is a physical or organisational site owned by
//! exactly one registered manager. It is stored on disk as an Organization
//! resource carrying its regulator identifiers (ODS code and CQC location ID)
//! and a reference to the owning manager record.

use crate::practitioner::MetaWire;
use crate::FhirError;
use chrono::{DateTime, Utc};
use hans_uuid::RecordUuid;
use serde::{Deserialize, Serialize};

/// Domain-level carrier for care-provider-location data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrganizationData {
    /// Unique identifier for this location record.
    pub id: RecordUuid,

    /// Human-readable site name.
    pub name: String,

    /// Contact email address for the site.
    pub email: String,

    /// NHS Organisation Data Service site code.
    pub ods_code: String,

    /// CQC location identifier.
    pub cqc_location_id: String,

    /// Identifier of the owning registered-manager record.
    pub manager_id: RecordUuid,

    /// Last updated timestamp.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Care-provider-location resource operations.
pub struct Organization;

impl Organization {
    /// Parse a location resource from YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] on schema mismatch, unknown keys, a wrong
    /// resourceType, or non-canonical identifiers.
    pub fn parse(yaml_text: &str) -> Result<OrganizationData, FhirError> {
        let deserializer = serde_yaml::Deserializer::from_str(yaml_text);

        let wire = match serde_path_to_error::deserialize::<_, OrganizationWire>(deserializer) {
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
                    "Organization schema mismatch at {path}: {source}"
                )));
            }
        };

        if wire.resource_type != "Organization" {
            return Err(FhirError::InvalidInput(format!(
                "Expected resourceType 'Organization', got '{}'",
                wire.resource_type
            )));
        }

        let id = RecordUuid::parse(&wire.id)
            .map_err(|e| FhirError::InvalidIdentifier(format!("Invalid location ID: {e}")))?;
        let manager_id = RecordUuid::parse(&wire.manager_id)
            .map_err(|e| FhirError::InvalidIdentifier(format!("Invalid manager ID: {e}")))?;

        let last_updated = wire
            .meta
            .and_then(|m| m.last_updated)
            .and_then(|s| s.parse::<DateTime<Utc>>().ok());

        Ok(OrganizationData {
            id,
            name: wire.name,
            email: wire.email,
            ods_code: wire.ods_code,
            cqc_location_id: wire.cqc_location_id,
            manager_id,
            last_updated,
        })
    }

    /// Render a location resource as YAML text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if serialisation fails.
    pub fn render(data: &OrganizationData) -> Result<String, FhirError> {
        let wire = OrganizationWire {
            resource_type: "Organization".to_string(),
            id: data.id.to_string(),
            name: data.name.clone(),
            email: data.email.clone(),
            ods_code: data.ods_code.clone(),
            cqc_location_id: data.cqc_location_id.clone(),
            manager_id: data.manager_id.to_string(),
            meta: data.last_updated.map(|lu| MetaWire {
                last_updated: Some(lu.to_rfc3339()),
            }),
        };
        serde_yaml::to_string(&wire)
            .map_err(|e| FhirError::Translation(format!("Failed to serialise location: {e}")))
    }
}

/// Wire representation of a location resource for on-disk YAML.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
struct OrganizationWire {
    #[serde(rename = "resourceType")]
    pub resource_type: String,

    pub id: String,

    pub name: String,

    pub email: String,

    #[serde(rename = "odsCode")]
    pub ods_code: String,

    #[serde(rename = "cqcLocationId")]
    pub cqc_location_id: String,

    #[serde(rename = "managerId")]
    pub manager_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<MetaWire>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_yaml() -> &'static str {
        r#"resourceType: Organization
id: 550e8400e29b41d4a716446655440000
name: My Location Name
email: nosuchaddress@nhs.net
odsCode: V81999
cqcLocationId: 1-100000001
managerId: 90a8d1ea318041d9adb070a834d4e0f6
meta:
  lastUpdated: 2026-01-23T13:58:04.099304Z
"#
    }

    #[test]
    fn round_trips_sample_yaml() {
        let data = Organization::parse(sample_yaml()).expect("parse yaml");
        assert_eq!(data.name, "My Location Name");
        assert_eq!(data.ods_code, "V81999");

        let output = Organization::render(&data).expect("render location");
        let reparsed = Organization::parse(&output).expect("reparse yaml");
        assert_eq!(data, reparsed);
    }

    #[test]
    fn strict_validation_rejects_unknown_keys() {
        let input = sample_yaml().replace("odsCode", "unexpectedCode");
        let err = Organization::parse(&input).expect_err("should reject unknown key");
        assert!(matches!(err, FhirError::Translation(_)));
    }

    #[test]
    fn rejects_invalid_resource_type() {
        let input = sample_yaml().replace("resourceType: Organization", "resourceType: Location");
        let err = Organization::parse(&input).expect_err("should reject resourceType");
        assert!(matches!(err, FhirError::InvalidInput(_)));
    }
}
