//! Care-recipient record management.
//!
//! Care recipients are patients registered at a care-provider location. The
//! registry never stores their plaintext NHS number or any demographic data:
//! the service accepts the plaintext number transiently, derives the one-way
//! pseudonym hash, and persists only the hash plus correlation identifiers
//! (subscription ID, provider reference, owning location).
//!
//! The pseudonymized search endpoint is served from here:
//! [`RecipientService::find_by_pseudonym`] resolves a hash to the matching
//! record by walking the sharded store.

use crate::actor::Actor;
use crate::config::CoreConfig;
use crate::constants::{DEFAULT_GITIGNORE, RECIPIENT_FILE_NAME};
use crate::error::{RegistryError, RegistryResult};
use crate::pseudonym::derive_pseudonym;
use crate::registry::locations::LocationService;
use crate::registry::{create_unique_record_dir, read_record_file, walk_record_files};
use crate::versioned::{CommitAction, CommitDomain, CommitMessage, FileToWrite, VersionedFileService};
use chrono::Utc;
use hans_fhir::{CareRecipient, CareRecipientData};
use hans_types::NonEmptyText;
use hans_uuid::{RecordUuid, Sha256Hash};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Input for creating a care recipient.
///
/// `nhs_number` is the plaintext national identifier. It is validated and
/// hashed during creation and never persisted.
#[derive(Clone, Debug)]
pub struct NewCareRecipient {
    pub location_id: RecordUuid,
    pub nhs_number: String,
    pub provider_reference_id: NonEmptyText,
    pub subscription_id: Uuid,
}

/// Service for managing care-recipient records.
#[derive(Clone, Debug)]
pub struct RecipientService {
    cfg: Arc<CoreConfig>,
}

impl RecipientService {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    /// Creates a new care-recipient record.
    ///
    /// Validates the owning location, derives the pseudonym hash from the
    /// plaintext NHS number, rejects duplicates of that hash, and commits the
    /// new record. The plaintext number is dropped on return.
    ///
    /// # Errors
    ///
    /// Returns:
    /// - `RegistryError::UnknownLocation` if the location does not resolve
    /// - `RegistryError::InvalidNhsNumber` for a malformed NHS number
    /// - `RegistryError::DuplicatePseudonym` if a recipient with the same
    ///   hash already exists
    /// - storage/Git errors from record creation
    pub fn create(
        &self,
        actor: &Actor,
        new: NewCareRecipient,
    ) -> RegistryResult<CareRecipientData> {
        let locations = LocationService::new(self.cfg.clone());
        if locations.get(&new.location_id)?.is_none() {
            return Err(RegistryError::UnknownLocation(new.location_id));
        }

        let nhs_number_hash = derive_pseudonym(self.cfg.pseudonym_salt(), &new.nhs_number)?;
        if self.find_by_hash(&nhs_number_hash).is_some() {
            return Err(RegistryError::DuplicatePseudonym);
        }

        let recipients_dir = self.cfg.recipients_dir();
        let (recipient_uuid, recipient_dir) = create_unique_record_dir(&recipients_dir)?;

        let data = CareRecipientData {
            id: recipient_uuid,
            nhs_number_hash,
            subscription_id: new.subscription_id.to_string(),
            provider_reference_id: new.provider_reference_id.as_str().to_owned(),
            location_id: new.location_id,
            last_updated: Some(Utc::now()),
        };
        let recipient_yaml = CareRecipient::render(&data)?;

        let commit_message = CommitMessage::new(
            CommitDomain::Recipients,
            CommitAction::Create,
            "Care recipient record created",
        )?;

        let files = [
            FileToWrite {
                relative_path: Path::new(".gitignore"),
                content: DEFAULT_GITIGNORE,
                old_content: None,
            },
            FileToWrite {
                relative_path: Path::new(RECIPIENT_FILE_NAME),
                content: &recipient_yaml,
                old_content: None,
            },
        ];

        VersionedFileService::init_and_commit(&recipient_dir, actor, &commit_message, &files)?;

        Ok(data)
    }

    /// Reads a care-recipient record by identifier.
    ///
    /// # Errors
    ///
    /// Returns `Ok(None)` if no record exists for the identifier; parse and
    /// I/O failures are surfaced as errors.
    pub fn get(&self, id: &RecordUuid) -> RegistryResult<Option<CareRecipientData>> {
        let recipients_dir = self.cfg.recipients_dir();
        match read_record_file(&recipients_dir, id, RECIPIENT_FILE_NAME)? {
            Some(contents) => Ok(Some(CareRecipient::parse(&contents)?)),
            None => Ok(None),
        }
    }

    /// Lists all care-recipient records.
    ///
    /// Individual files that cannot be parsed are logged as warnings and
    /// skipped.
    pub fn list(&self) -> Vec<CareRecipientData> {
        let recipients_dir = self.cfg.recipients_dir();

        let mut recipients = Vec::new();
        for record_path in walk_record_files(&recipients_dir, RECIPIENT_FILE_NAME) {
            let Ok(contents) = std::fs::read_to_string(&record_path) else {
                continue;
            };
            match CareRecipient::parse(&contents) {
                Ok(data) => recipients.push(data),
                Err(e) => {
                    tracing::warn!(
                        "failed to parse recipient.yaml: {} - {}",
                        record_path.display(),
                        e
                    );
                }
            }
        }

        recipients
    }

    /// Lists the care recipients registered at one location.
    pub fn list_for_location(&self, location_id: &RecordUuid) -> Vec<CareRecipientData> {
        self.list()
            .into_iter()
            .filter(|r| &r.location_id == location_id)
            .collect()
    }

    /// Resolves a pseudonymized identifier to a care-recipient record.
    ///
    /// The input is an externally supplied string; anything that is not a
    /// canonical hash (wrong length, uppercase, non-hex) cannot match any
    /// stored record and resolves to `None` rather than an error.
    pub fn find_by_pseudonym(&self, pseudo_id: &str) -> Option<CareRecipientData> {
        let hash = Sha256Hash::parse(pseudo_id).ok()?;
        self.find_by_hash(&hash)
    }

    fn find_by_hash(&self, hash: &Sha256Hash) -> Option<CareRecipientData> {
        self.list().into_iter().find(|r| &r.nhs_number_hash == hash)
    }
}
