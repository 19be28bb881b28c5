//! Registry record services.
//!
//! This module contains the services for managing the three record kinds of
//! the management interface: registered managers, care-provider locations,
//! and care recipients.

pub mod locations;
pub mod managers;
pub mod recipients;

use crate::{RegistryError, RegistryResult};
use hans_uuid::RecordUuid;
use std::{
    fs,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

/// Creates a unique sharded directory within the base records directory.
///
/// Generates record UUIDs and attempts to create the corresponding sharded
/// directory, guarding against pathological UUID collisions (or pre-existing
/// directories from external interference) by retrying up to 5 times.
///
/// # Errors
///
/// Returns `RegistryError::StorageDirCreation` if the sharded parent
/// directories cannot be created, and `RegistryError::RecordDirCreation` if
/// the record directory itself cannot be created (including after 5
/// collision retries).
pub(crate) fn create_unique_record_dir(
    base_dir: &Path,
) -> RegistryResult<(RecordUuid, PathBuf)> {
    for _attempt in 0..5 {
        let uuid = RecordUuid::new();
        let candidate = uuid.sharded_dir(base_dir);

        if candidate.exists() {
            continue;
        }

        if let Some(parent) = candidate.parent() {
            fs::create_dir_all(parent).map_err(RegistryError::StorageDirCreation)?;
        }

        match fs::create_dir(&candidate) {
            Ok(()) => return Ok((uuid, candidate)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(RegistryError::RecordDirCreation(e)),
        }
    }

    Err(RegistryError::RecordDirCreation(io::Error::new(
        ErrorKind::AlreadyExists,
        "failed to allocate a unique record directory after 5 attempts",
    )))
}

/// Walks a sharded record tree and yields the paths of every record file.
///
/// Expects records stored in `<base_dir>/<s1>/<s2>/<uuid>/<file_name>` where
/// `s1`/`s2` are the first four hex characters of the UUID. Entries that are
/// not directories, or directories without the record file, are skipped. A
/// missing `base_dir` yields no paths.
pub(crate) fn walk_record_files(base_dir: &Path, file_name: &str) -> Vec<PathBuf> {
    let mut found = Vec::new();

    let s1_iter = match fs::read_dir(base_dir) {
        Ok(it) => it,
        Err(_) => return found,
    };
    for s1 in s1_iter.flatten() {
        let s1_path = s1.path();
        if !s1_path.is_dir() {
            continue;
        }

        let s2_iter = match fs::read_dir(&s1_path) {
            Ok(it) => it,
            Err(_) => continue,
        };
        for s2 in s2_iter.flatten() {
            let s2_path = s2.path();
            if !s2_path.is_dir() {
                continue;
            }

            let id_iter = match fs::read_dir(&s2_path) {
                Ok(it) => it,
                Err(_) => continue,
            };
            for id_ent in id_iter.flatten() {
                let id_path = id_ent.path();
                if !id_path.is_dir() {
                    continue;
                }

                let record_path = id_path.join(file_name);
                if record_path.is_file() {
                    found.push(record_path);
                }
            }
        }
    }

    found
}

/// Reads a record file from its sharded location.
///
/// Returns `Ok(None)` if the record directory or file does not exist; any
/// other I/O failure is surfaced as `RegistryError::FileRead`.
pub(crate) fn read_record_file(
    base_dir: &Path,
    id: &RecordUuid,
    file_name: &str,
) -> RegistryResult<Option<String>> {
    let record_path = id.sharded_dir(base_dir).join(file_name);
    match fs::read_to_string(&record_path) {
        Ok(contents) => Ok(Some(contents)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RegistryError::FileRead(e)),
    }
}
