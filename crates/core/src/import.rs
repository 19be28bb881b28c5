//! Bulk CSV import of care recipients.
//!
//! The admin surface accepts a CSV upload per care-provider location. The
//! expected file carries one care recipient per data row:
//!
//! ```csv
//! nhs_number,given_name,family_name,birth_date,provider_reference_id
//! 9434765919,Sarah,Williams,1992-03-20,AX812938
//! ```
//!
//! File-level validation happens up front and rejects the whole upload; row
//! processing is best-effort, accumulating errors without aborting the batch.
//! For every row that passes validation exactly one subscription is created
//! in the external system and exactly one care-recipient record is
//! persisted. The demographic columns (`given_name`, `family_name`,
//! `birth_date`) are validated and then discarded; only the derived
//! pseudonym hash and correlation identifiers reach storage.

use crate::actor::Actor;
use crate::config::CoreConfig;
use crate::error::RegistryError;
use crate::pseudonym::derive_pseudonym;
use crate::registry::locations::LocationService;
use crate::registry::recipients::{NewCareRecipient, RecipientService};
use crate::subscription::SubscriptionService;
use chrono::NaiveDate;
use hans_types::NonEmptyText;
use hans_uuid::RecordUuid;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

/// The exact column set an import file must carry.
pub const EXPECTED_COLUMNS: [&str; 5] = [
    "nhs_number",
    "given_name",
    "family_name",
    "birth_date",
    "provider_reference_id",
];

/// Failures that reject an upload before any row is processed.
///
/// The `Display` strings of the first three variants are user-facing flash
/// messages; the admin tests assert their exact wording.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("Invalid or empty file")]
    InvalidOrEmptyFile,

    #[error("File is corrupted or binary")]
    CorruptedOrBinaryFile,

    #[error("Invalid column set")]
    InvalidColumnSet,

    #[error("care provider location not found: {0}")]
    UnknownLocation(RecordUuid),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// A single failed data row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RowError {
    /// 1-based position among the data rows (the header is not counted).
    pub row: usize,
    /// Human-readable reason the row was skipped.
    pub reason: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.reason)
    }
}

/// Outcome of a completed (non-rejected) import.
#[derive(Clone, Debug, Default)]
pub struct ImportSummary {
    /// Number of care recipients created.
    pub imported: usize,
    /// Rows that were skipped, in file order.
    pub row_errors: Vec<RowError>,
}

impl ImportSummary {
    /// Renders the flash message shown to the administrator.
    pub fn message(&self) -> String {
        let mut message = format!(
            "File imported successfully: {} care recipient(s) created.",
            self.imported
        );
        if !self.row_errors.is_empty() {
            let details: Vec<String> = self.row_errors.iter().map(RowError::to_string).collect();
            message.push_str(&format!(
                " {} error(s): {}.",
                self.row_errors.len(),
                details.join("; ")
            ));
        }
        message
    }
}

/// One parsed data row, reduced to the fields that may be persisted.
///
/// The demographic columns are read during parsing (so truncated rows are
/// caught) and dropped immediately; they never leave [`parse_row`].
struct CsvRow {
    nhs_number: String,
    birth_date: String,
    provider_reference_id: String,
}

/// Service running CSV imports against one registry.
pub struct CsvImportService<'a> {
    cfg: Arc<CoreConfig>,
    subscriptions: &'a dyn SubscriptionService,
}

impl<'a> CsvImportService<'a> {
    pub fn new(cfg: Arc<CoreConfig>, subscriptions: &'a dyn SubscriptionService) -> Self {
        Self { cfg, subscriptions }
    }

    /// Imports care recipients from uploaded CSV bytes into one location.
    ///
    /// Preconditions are checked in order: non-empty upload, decodable
    /// non-binary text, exact expected column set, known target location.
    /// Each data row is then processed independently; a failed row is
    /// recorded in the summary and processing continues.
    ///
    /// # Errors
    ///
    /// Returns an [`ImportError`] for file-level rejections. Row-level
    /// failures never produce an `Err`; they are accumulated in the returned
    /// [`ImportSummary`].
    pub fn import(
        &self,
        actor: &Actor,
        location_id: &RecordUuid,
        upload: &[u8],
    ) -> Result<ImportSummary, ImportError> {
        if upload.is_empty() {
            return Err(ImportError::InvalidOrEmptyFile);
        }

        // A recognised binary signature (image, archive, executable, ...)
        // means the upload is not a CSV regardless of how it decodes.
        if infer::get(upload).is_some() {
            return Err(ImportError::CorruptedOrBinaryFile);
        }
        let text = std::str::from_utf8(upload).map_err(|_| ImportError::CorruptedOrBinaryFile)?;

        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let headers = reader
            .headers()
            .map_err(|_| ImportError::InvalidColumnSet)?
            .clone();
        let header_set: BTreeSet<&str> = headers.iter().collect();
        let expected_set: BTreeSet<&str> = EXPECTED_COLUMNS.iter().copied().collect();
        if header_set != expected_set {
            return Err(ImportError::InvalidColumnSet);
        }

        let locations = LocationService::new(self.cfg.clone());
        match locations.get(location_id) {
            Ok(Some(_)) => {}
            Ok(None) => return Err(ImportError::UnknownLocation(location_id.clone())),
            Err(e) => return Err(ImportError::Registry(e)),
        }

        let recipients = RecipientService::new(self.cfg.clone());

        let mut summary = ImportSummary::default();
        for (index, record) in reader.records().enumerate() {
            let row_number = index + 1;

            match self.import_row(actor, location_id, &recipients, &headers, record) {
                Ok(()) => summary.imported += 1,
                Err(reason) => {
                    tracing::warn!("import row {} skipped: {}", row_number, reason);
                    summary.row_errors.push(RowError {
                        row: row_number,
                        reason,
                    });
                }
            }
        }

        tracing::info!(
            "imported {} care recipient(s) into location {} ({} row error(s))",
            summary.imported,
            location_id,
            summary.row_errors.len()
        );

        Ok(summary)
    }

    /// Processes one data row; any `Err` is a row-level error message.
    fn import_row(
        &self,
        actor: &Actor,
        location_id: &RecordUuid,
        recipients: &RecipientService,
        headers: &csv::StringRecord,
        record: Result<csv::StringRecord, csv::Error>,
    ) -> Result<(), String> {
        let record = record.map_err(|e| format!("malformed CSV record: {e}"))?;
        let row = parse_row(headers, &record)?;

        // Validate before the subscription call so the external system is
        // only ever contacted for rows that will be persisted.
        if row.provider_reference_id.is_empty() {
            return Err("provider_reference_id is required".into());
        }
        if !row.birth_date.is_empty()
            && NaiveDate::parse_from_str(&row.birth_date, "%Y-%m-%d").is_err()
        {
            return Err(format!("invalid birth_date '{}'", row.birth_date));
        }

        let hash = derive_pseudonym(self.cfg.pseudonym_salt(), &row.nhs_number)
            .map_err(|e| e.to_string())?;
        if recipients.find_by_pseudonym(hash.as_str()).is_some() {
            return Err(RegistryError::DuplicatePseudonym.to_string());
        }

        let subscription_id = self
            .subscriptions
            .create_subscription(&hash)
            .map_err(|e| e.to_string())?;

        let provider_reference_id = NonEmptyText::new(&row.provider_reference_id)
            .map_err(|_| "provider_reference_id is required".to_string())?;

        recipients
            .create(
                actor,
                NewCareRecipient {
                    location_id: location_id.clone(),
                    nhs_number: row.nhs_number,
                    provider_reference_id,
                    subscription_id,
                },
            )
            .map_err(|e| e.to_string())?;

        Ok(())
    }
}

/// Extracts the expected columns from a record by header name.
fn parse_row(headers: &csv::StringRecord, record: &csv::StringRecord) -> Result<CsvRow, String> {
    let field = |name: &str| -> Result<String, String> {
        let position = headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| format!("missing column '{name}'"))?;
        record
            .get(position)
            .map(str::to_owned)
            .ok_or_else(|| format!("missing value for column '{name}'"))
    };

    // Demographic values are required to be present but are not kept.
    field("given_name")?;
    field("family_name")?;

    Ok(CsvRow {
        nhs_number: field("nhs_number")?,
        birth_date: field("birth_date")?,
        provider_reference_id: field("provider_reference_id")?,
    })
}
