//! Care-provider-location record management.
//!
//! A care-provider location is a physical or organisational site owned by
//! exactly one registered manager. Locations own care recipients; the
//! pseudonymized search endpoint resolves a hash to the owning location's
//! name.
//!
//! Storage follows the registry convention: one sharded directory per record
//! containing a `location.yaml` Organization resource and a Git repository
//! for the audit trail.

use crate::actor::Actor;
use crate::config::CoreConfig;
use crate::constants::{DEFAULT_GITIGNORE, LOCATION_FILE_NAME};
use crate::error::{RegistryError, RegistryResult};
use crate::registry::managers::ManagerService;
use crate::registry::{create_unique_record_dir, read_record_file, walk_record_files};
use crate::versioned::{CommitAction, CommitDomain, CommitMessage, FileToWrite, VersionedFileService};
use chrono::Utc;
use hans_fhir::{Organization, OrganizationData};
use hans_types::{EmailAddress, NonEmptyText};
use hans_uuid::RecordUuid;
use std::path::Path;
use std::sync::Arc;

/// Validated input for creating a care-provider location.
#[derive(Clone, Debug)]
pub struct NewCareProviderLocation {
    pub name: NonEmptyText,
    pub email: EmailAddress,
    pub ods_code: NonEmptyText,
    pub cqc_location_id: NonEmptyText,
    pub manager_id: RecordUuid,
}

/// Service for managing care-provider-location records.
#[derive(Clone, Debug)]
pub struct LocationService {
    cfg: Arc<CoreConfig>,
}

impl LocationService {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    /// Creates a new care-provider-location record.
    ///
    /// The owning manager must already exist; a location is never created
    /// without a responsible registered manager.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::UnknownManager` if `new.manager_id` does not
    /// resolve, or storage/Git errors from record creation.
    pub fn create(
        &self,
        actor: &Actor,
        new: NewCareProviderLocation,
    ) -> RegistryResult<OrganizationData> {
        let managers = ManagerService::new(self.cfg.clone());
        if managers.get(&new.manager_id)?.is_none() {
            return Err(RegistryError::UnknownManager(new.manager_id));
        }

        let locations_dir = self.cfg.locations_dir();
        let (location_uuid, location_dir) = create_unique_record_dir(&locations_dir)?;

        let data = OrganizationData {
            id: location_uuid,
            name: new.name.as_str().to_owned(),
            email: new.email.as_str().to_owned(),
            ods_code: new.ods_code.as_str().to_owned(),
            cqc_location_id: new.cqc_location_id.as_str().to_owned(),
            manager_id: new.manager_id,
            last_updated: Some(Utc::now()),
        };
        let location_yaml = Organization::render(&data)?;

        let commit_message = CommitMessage::new(
            CommitDomain::Locations,
            CommitAction::Create,
            "Care provider location record created",
        )?;

        let files = [
            FileToWrite {
                relative_path: Path::new(".gitignore"),
                content: DEFAULT_GITIGNORE,
                old_content: None,
            },
            FileToWrite {
                relative_path: Path::new(LOCATION_FILE_NAME),
                content: &location_yaml,
                old_content: None,
            },
        ];

        VersionedFileService::init_and_commit(&location_dir, actor, &commit_message, &files)?;

        Ok(data)
    }

    /// Reads a location record by identifier.
    ///
    /// # Errors
    ///
    /// Returns `Ok(None)` if no record exists for the identifier; parse and
    /// I/O failures are surfaced as errors.
    pub fn get(&self, id: &RecordUuid) -> RegistryResult<Option<OrganizationData>> {
        let locations_dir = self.cfg.locations_dir();
        match read_record_file(&locations_dir, id, LOCATION_FILE_NAME)? {
            Some(contents) => Ok(Some(Organization::parse(&contents)?)),
            None => Ok(None),
        }
    }

    /// Lists all location records.
    ///
    /// Individual files that cannot be parsed are logged as warnings and
    /// skipped.
    pub fn list(&self) -> Vec<OrganizationData> {
        let locations_dir = self.cfg.locations_dir();

        let mut locations = Vec::new();
        for record_path in walk_record_files(&locations_dir, LOCATION_FILE_NAME) {
            let Ok(contents) = std::fs::read_to_string(&record_path) else {
                continue;
            };
            match Organization::parse(&contents) {
                Ok(data) => locations.push(data),
                Err(e) => {
                    tracing::warn!(
                        "failed to parse location.yaml: {} - {}",
                        record_path.display(),
                        e
                    );
                }
            }
        }

        locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::managers::NewRegisteredManager;
    use tempfile::TempDir;

    fn test_actor() -> Actor {
        Actor::new("Test Administrator", "admin@example.com").expect("valid actor")
    }

    fn test_cfg(registry_data_dir: &Path) -> Arc<CoreConfig> {
        Arc::new(CoreConfig::new(
            registry_data_dir.to_path_buf(),
            NonEmptyText::new("test-salt").expect("valid salt"),
        ))
    }

    fn create_manager(cfg: &Arc<CoreConfig>) -> RecordUuid {
        ManagerService::new(cfg.clone())
            .create(
                &test_actor(),
                NewRegisteredManager {
                    given_name: NonEmptyText::new("Jehosephat").expect("valid name"),
                    family_name: NonEmptyText::new("McGibbons").expect("valid name"),
                    cqc_registered_manager_id: NonEmptyText::new("1-000000001")
                        .expect("valid id"),
                },
            )
            .expect("manager create should succeed")
            .id
    }

    fn test_location(manager_id: RecordUuid) -> NewCareProviderLocation {
        NewCareProviderLocation {
            name: NonEmptyText::new("My Location Name").expect("valid name"),
            email: EmailAddress::parse("nosuchaddress@nhs.net").expect("valid email"),
            ods_code: NonEmptyText::new("V81999").expect("valid code"),
            cqc_location_id: NonEmptyText::new("1-100000001").expect("valid id"),
            manager_id,
        }
    }

    #[test]
    fn create_requires_existing_manager() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        let service = LocationService::new(cfg);

        let err = service
            .create(&test_actor(), test_location(RecordUuid::new()))
            .expect_err("unknown manager should be rejected");
        assert!(matches!(err, RegistryError::UnknownManager(_)));
        assert!(service.list().is_empty(), "no location should be created");
    }

    #[test]
    fn create_and_get_round_trip() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        let manager_id = create_manager(&cfg);
        let service = LocationService::new(cfg);

        let created = service
            .create(&test_actor(), test_location(manager_id.clone()))
            .expect("create should succeed");

        let fetched = service
            .get(&created.id)
            .expect("get should succeed")
            .expect("location should exist");
        assert_eq!(fetched.name, "My Location Name");
        assert_eq!(fetched.ods_code, "V81999");
        assert_eq!(fetched.manager_id, manager_id);

        let location_dir = created.id.sharded_dir(&temp_dir.path().join("locations"));
        assert!(
            location_dir.join(".git").is_dir(),
            "git repository should be initialised"
        );
    }

    #[test]
    fn list_returns_all_created_locations() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        let manager_id = create_manager(&cfg);
        let service = LocationService::new(cfg);

        let mut first = test_location(manager_id.clone());
        first.name = NonEmptyText::new("First Site").expect("valid name");
        let mut second = test_location(manager_id);
        second.name = NonEmptyText::new("Second Site").expect("valid name");
        second.cqc_location_id = NonEmptyText::new("1-100000002").expect("valid id");

        service
            .create(&test_actor(), first)
            .expect("create should succeed");
        service
            .create(&test_actor(), second)
            .expect("create should succeed");

        let locations = service.list();
        assert_eq!(locations.len(), 2, "should list both locations");
        assert!(locations.iter().any(|l| l.name == "First Site"));
        assert!(locations.iter().any(|l| l.name == "Second Site"));
    }
}
