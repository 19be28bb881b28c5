//! Registered-manager record management.
//!
//! A registered manager is the responsible individual for a care-provider
//! organisation, per the external regulator's registration. Managers own
//! care-provider locations.
//!
//! ## Storage layout
//!
//! Managers are stored as YAML files in a sharded structure:
//!
//! ```text
//! managers/
//!   <s1>/
//!     <s2>/
//!       <uuid>/
//!         manager.yaml    # FHIR-aligned Practitioner resource
//!         .git/           # Git repository for versioning
//! ```
//!
//! where `s1` and `s2` are the first four hex characters of the UUID.
//!
//! This module contains **only** data operations. API concerns such as
//! authentication or HTTP servers belong in the REST binary and CLI.

use crate::actor::Actor;
use crate::config::CoreConfig;
use crate::constants::{DEFAULT_GITIGNORE, MANAGER_FILE_NAME};
use crate::error::{RegistryError, RegistryResult};
use crate::registry::{create_unique_record_dir, read_record_file, walk_record_files};
use crate::versioned::{CommitAction, CommitDomain, CommitMessage, FileToWrite, VersionedFileService};
use chrono::Utc;
use hans_fhir::{Practitioner, PractitionerData};
use hans_types::NonEmptyText;
use hans_uuid::RecordUuid;
use std::path::Path;
use std::sync::Arc;

/// Validated input for creating a registered manager.
#[derive(Clone, Debug)]
pub struct NewRegisteredManager {
    pub given_name: NonEmptyText,
    pub family_name: NonEmptyText,
    pub cqc_registered_manager_id: NonEmptyText,
}

/// Service for managing registered-manager records.
#[derive(Clone, Debug)]
pub struct ManagerService {
    cfg: Arc<CoreConfig>,
}

impl ManagerService {
    /// Creates a new manager service.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Core configuration containing the registry data directory
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    /// Creates a new registered-manager record.
    ///
    /// Allocates a fresh UUID, renders the manager as a Practitioner resource
    /// in a sharded directory, and commits the initial state to a new Git
    /// repository.
    ///
    /// # Arguments
    ///
    /// * `actor` - The administrative user recorded in the Git commit
    /// * `new` - Validated manager fields
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::DuplicateManagerId` if a manager with the same
    /// CQC registered-manager ID already exists, or storage/Git errors from
    /// record creation. On failure the partially-created directory is removed.
    pub fn create(
        &self,
        actor: &Actor,
        new: NewRegisteredManager,
    ) -> RegistryResult<PractitionerData> {
        if self
            .find_by_cqc_id(new.cqc_registered_manager_id.as_str())
            .is_some()
        {
            return Err(RegistryError::DuplicateManagerId(
                new.cqc_registered_manager_id.as_str().to_owned(),
            ));
        }

        let managers_dir = self.cfg.managers_dir();
        let (manager_uuid, manager_dir) = create_unique_record_dir(&managers_dir)?;

        let data = PractitionerData {
            id: manager_uuid,
            given_name: new.given_name.as_str().to_owned(),
            family_name: new.family_name.as_str().to_owned(),
            cqc_registered_manager_id: new.cqc_registered_manager_id.as_str().to_owned(),
            last_updated: Some(Utc::now()),
        };
        let manager_yaml = Practitioner::render(&data)?;

        let commit_message = CommitMessage::new(
            CommitDomain::Managers,
            CommitAction::Create,
            "Registered manager record created",
        )?;

        let files = [
            FileToWrite {
                relative_path: Path::new(".gitignore"),
                content: DEFAULT_GITIGNORE,
                old_content: None,
            },
            FileToWrite {
                relative_path: Path::new(MANAGER_FILE_NAME),
                content: &manager_yaml,
                old_content: None,
            },
        ];

        VersionedFileService::init_and_commit(&manager_dir, actor, &commit_message, &files)?;

        Ok(data)
    }

    /// Reads a manager record by identifier.
    ///
    /// # Errors
    ///
    /// Returns `Ok(None)` if no record exists for the identifier; parse and
    /// I/O failures are surfaced as errors.
    pub fn get(&self, id: &RecordUuid) -> RegistryResult<Option<PractitionerData>> {
        let managers_dir = self.cfg.managers_dir();
        match read_record_file(&managers_dir, id, MANAGER_FILE_NAME)? {
            Some(contents) => Ok(Some(Practitioner::parse(&contents)?)),
            None => Ok(None),
        }
    }

    /// Lists all manager records.
    ///
    /// Traverses the sharded directory structure and parses every
    /// `manager.yaml`. Individual files that cannot be parsed are logged as
    /// warnings and skipped.
    pub fn list(&self) -> Vec<PractitionerData> {
        let managers_dir = self.cfg.managers_dir();

        let mut managers = Vec::new();
        for record_path in walk_record_files(&managers_dir, MANAGER_FILE_NAME) {
            let Ok(contents) = std::fs::read_to_string(&record_path) else {
                continue;
            };
            match Practitioner::parse(&contents) {
                Ok(data) => managers.push(data),
                Err(e) => {
                    tracing::warn!(
                        "failed to parse manager.yaml: {} - {}",
                        record_path.display(),
                        e
                    );
                }
            }
        }

        managers
    }

    /// Finds the manager carrying the given CQC registered-manager ID.
    fn find_by_cqc_id(&self, cqc_id: &str) -> Option<PractitionerData> {
        self.list()
            .into_iter()
            .find(|m| m.cqc_registered_manager_id == cqc_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hans_types::NonEmptyText;
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

    fn test_manager(cqc_id: &str) -> NewRegisteredManager {
        NewRegisteredManager {
            given_name: NonEmptyText::new("Jehosephat").expect("valid name"),
            family_name: NonEmptyText::new("McGibbons").expect("valid name"),
            cqc_registered_manager_id: NonEmptyText::new(cqc_id).expect("valid id"),
        }
    }

    #[test]
    fn create_writes_sharded_versioned_record() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        let service = ManagerService::new(cfg);

        let created = service
            .create(&test_actor(), test_manager("1-000000001"))
            .expect("create should succeed");

        let manager_dir = created.id.sharded_dir(&temp_dir.path().join("managers"));
        assert!(manager_dir.exists(), "manager directory should exist");
        assert!(
            manager_dir.join(".git").is_dir(),
            "git repository should be initialised"
        );
        assert!(
            manager_dir.join(MANAGER_FILE_NAME).is_file(),
            "manager.yaml should exist"
        );
    }

    #[test]
    fn create_rejects_duplicate_cqc_id() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        let service = ManagerService::new(cfg);

        service
            .create(&test_actor(), test_manager("1-000000001"))
            .expect("first create should succeed");

        let err = service
            .create(&test_actor(), test_manager("1-000000001"))
            .expect_err("duplicate CQC ID should be rejected");
        assert!(matches!(err, RegistryError::DuplicateManagerId(_)));
        assert_eq!(service.list().len(), 1, "only one record should exist");
    }

    #[test]
    fn get_round_trips_created_manager() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        let service = ManagerService::new(cfg);

        let created = service
            .create(&test_actor(), test_manager("1-000000001"))
            .expect("create should succeed");

        let fetched = service
            .get(&created.id)
            .expect("get should succeed")
            .expect("manager should exist");
        assert_eq!(fetched.given_name, "Jehosephat");
        assert_eq!(fetched.family_name, "McGibbons");
        assert_eq!(fetched.cqc_registered_manager_id, "1-000000001");
    }

    #[test]
    fn get_returns_none_for_unknown_id() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        let service = ManagerService::new(cfg);

        let missing = service
            .get(&RecordUuid::new())
            .expect("get should succeed");
        assert!(missing.is_none());
    }

    #[test]
    fn list_skips_unparsable_records() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let cfg = test_cfg(temp_dir.path());
        let service = ManagerService::new(cfg);

        service
            .create(&test_actor(), test_manager("1-000000001"))
            .expect("create should succeed");

        // Drop an invalid file into a fresh sharded slot.
        let rogue = RecordUuid::new();
        let rogue_dir = rogue.sharded_dir(&temp_dir.path().join("managers"));
        std::fs::create_dir_all(&rogue_dir).expect("should create directory");
        std::fs::write(rogue_dir.join(MANAGER_FILE_NAME), "not: [valid: yaml")
            .expect("should write invalid yaml");

        let managers = service.list();
        assert_eq!(managers.len(), 1, "invalid record should be skipped");
    }
}
