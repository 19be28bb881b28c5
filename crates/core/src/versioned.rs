//! Versioned file operations with Git-based version control.
//!
//! HANS stores registry records as files on disk and versions each record
//! directory using a local Git repository (`git2`/libgit2). This module
//! provides the high-level service for managing those files, ensuring:
//!
//! - **Atomic multi-file operations**: write multiple files and commit them in
//!   a single transaction with automatic rollback on failure
//! - **Consistent commit creation**: structured commit messages with a
//!   controlled vocabulary across all registry services
//! - **Immutable audit trail**: every change to a record is preserved in
//!   version control history
//!
//! ## Branch policy
//!
//! HANS standardises on `refs/heads/main` for all record repositories.
//!
//! ## Commit message format
//!
//! - Subject line: `<domain>:<action>: <summary>`
//! - Trailers: `Actor-Name` and `Actor-Email`, rendered from the structured
//!   [`Actor`] metadata
//! - No free-form prose paragraphs
//!
//! Commit messages are labels and indexes; do not include patient identifiers
//! in them.

use crate::actor::Actor;
use crate::error::{RegistryError, RegistryResult};
use hans_types::NonEmptyText;
use std::fmt;
use std::path::{Path, PathBuf};

const MAIN_REF: &str = "refs/heads/main";

/// Controlled vocabulary for commit message domains.
///
/// One domain per registry record kind.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CommitDomain {
    Managers,
    Locations,
    Recipients,
}

impl CommitDomain {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Managers => "managers",
            Self::Locations => "locations",
            Self::Recipients => "recipients",
        }
    }
}

impl fmt::Display for CommitDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Controlled vocabulary for commit message actions.
///
/// The registry never deletes data from version control history; the two
/// allowed operations both preserve prior state in Git history.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum CommitAction {
    Create,
    Update,
}

impl CommitAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
        }
    }
}

impl fmt::Display for CommitAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured, predictable commit message.
///
/// Rendering rules:
///
/// - Subject line: `<domain>:<action>: <summary>`
/// - A blank line, then the `Actor-Name` and `Actor-Email` trailers
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommitMessage {
    domain: CommitDomain,
    action: CommitAction,
    summary: NonEmptyText,
}

impl CommitMessage {
    /// Create a new commit message with required fields.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError::InvalidInput` if the summary is empty or
    /// contains newlines.
    pub fn new(
        domain: CommitDomain,
        action: CommitAction,
        summary: impl AsRef<str>,
    ) -> RegistryResult<Self> {
        let summary_str = summary.as_ref().trim();
        if summary_str.contains(['\n', '\r']) {
            return Err(RegistryError::InvalidInput(
                "commit summary must be single-line".into(),
            ));
        }
        let summary = NonEmptyText::new(summary_str)
            .map_err(|_| RegistryError::InvalidInput("commit summary must be non-empty".into()))?;

        Ok(Self {
            domain,
            action,
            summary,
        })
    }

    /// Render the full commit message including the mandatory actor trailers.
    ///
    /// # Errors
    ///
    /// Returns `RegistryError` from actor validation.
    pub fn render_with_actor(&self, actor: &Actor) -> RegistryResult<String> {
        actor.validate_commit_actor()?;

        let mut rendered = format!("{}:{}: {}", self.domain, self.action, self.summary.as_str());
        rendered.push_str("\n\n");
        rendered.push_str("Actor-Name: ");
        rendered.push_str(actor.name.as_str());
        rendered.push('\n');
        rendered.push_str("Actor-Email: ");
        rendered.push_str(actor.email.as_str());

        Ok(rendered)
    }
}

/// Represents a file to be written and committed.
///
/// Used with [`VersionedFileService::write_and_commit_files`] to write
/// multiple files in a single atomic commit operation.
#[derive(Debug, Clone)]
pub struct FileToWrite<'a> {
    /// The relative path to the file within the repository directory.
    pub relative_path: &'a Path,
    /// The new content to write to the file.
    pub content: &'a str,
    /// The previous file content for rollback. `None` if this is a new file.
    pub old_content: Option<&'a str>,
}

/// Service for common Git operations on a record repository.
///
/// Bundles the repository handle and its workdir so that workflows like
/// "initialise repo then commit files" are ergonomic at call sites.
pub struct VersionedFileService {
    repo: git2::Repository,
    workdir: PathBuf,
}

impl VersionedFileService {
    /// Create a new Git repository at the specified working directory.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::GitInit`] if initialisation fails or the
    /// repository has no working directory.
    fn init(workdir: &Path) -> RegistryResult<Self> {
        let repo = git2::Repository::init(workdir).map_err(RegistryError::GitInit)?;
        // Use the actual workdir from the repository to ensure path stripping works correctly.
        let actual_workdir = repo
            .workdir()
            .ok_or_else(|| {
                RegistryError::GitInit(git2::Error::from_str("repository has no working directory"))
            })?
            .to_path_buf();
        Ok(Self {
            repo,
            workdir: actual_workdir,
        })
    }

    /// Open an existing Git repository at the specified working directory.
    ///
    /// Uses `NO_SEARCH` so git2 does not walk parent directories looking for a
    /// `.git` folder; record repositories must stay isolated from each other.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::GitOpen`] if the repository cannot be opened
    /// or has no working directory.
    fn open(workdir: &Path) -> RegistryResult<Self> {
        let repo = git2::Repository::open_ext(
            workdir,
            git2::RepositoryOpenFlags::NO_SEARCH,
            std::iter::empty::<&std::ffi::OsStr>(),
        )
        .map_err(RegistryError::GitOpen)?;
        let actual_workdir = repo
            .workdir()
            .ok_or_else(|| {
                RegistryError::GitOpen(git2::Error::from_str("repository has no working directory"))
            })?
            .to_path_buf();
        Ok(Self {
            repo,
            workdir: actual_workdir,
        })
    }

    /// Initialise a Git repository, commit initial files, and clean up on failure.
    ///
    /// Either the record directory is fully initialised with its initial
    /// commit, or it is completely removed. This keeps the registry free of
    /// half-created records.
    ///
    /// # Errors
    ///
    /// Returns the underlying error if initialisation, file writes, or the
    /// commit fail. If cleanup also fails, returns
    /// [`RegistryError::CleanupAfterInitialiseFailed`] carrying both errors.
    pub fn init_and_commit(
        record_dir: &Path,
        actor: &Actor,
        message: &CommitMessage,
        files: &[FileToWrite<'_>],
    ) -> RegistryResult<()> {
        let result: RegistryResult<()> = (|| {
            let _repo = Self::init(record_dir)?;
            Self::write_and_commit_files(record_dir, actor, message, files)?;
            Ok(())
        })();

        match result {
            Ok(()) => Ok(()),
            Err(init_error) => {
                if let Err(cleanup_err) = std::fs::remove_dir_all(record_dir) {
                    return Err(RegistryError::CleanupAfterInitialiseFailed {
                        path: record_dir.to_path_buf(),
                        init_error: Box::new(init_error),
                        cleanup_error: cleanup_err,
                    });
                }
                Err(init_error)
            }
        }
    }

    /// Writes multiple files and commits them to Git with rollback on failure.
    ///
    /// Opens the record's repository, writes all files, and commits them in a
    /// single Git commit. On error:
    /// - files that previously existed are restored to their previous state
    /// - new files are removed
    ///
    /// # Errors
    ///
    /// Returns a `RegistryError` if repository opening, any file write, or the
    /// Git commit fails.
    pub fn write_and_commit_files(
        record_dir: &Path,
        actor: &Actor,
        message: &CommitMessage,
        files: &[FileToWrite<'_>],
    ) -> RegistryResult<()> {
        let repo = Self::open(record_dir)?;

        let mut written_files: Vec<(PathBuf, Option<String>)> = Vec::new();

        let result: RegistryResult<()> = (|| {
            for file in files {
                let full_path = repo.workdir.join(file.relative_path);
                let old_content = file.old_content.map(|s| s.to_string());

                std::fs::write(&full_path, file.content).map_err(RegistryError::FileWrite)?;
                written_files.push((full_path, old_content));
            }

            let paths: Vec<&Path> = files.iter().map(|f| f.relative_path).collect();
            repo.commit_paths(actor, message, &paths)?;

            Ok(())
        })();

        match result {
            Ok(()) => Ok(()),
            Err(write_error) => {
                // Rollback file changes (in reverse order)
                for (full_path, old_content) in written_files.iter().rev() {
                    match old_content {
                        Some(contents) => {
                            let _ = std::fs::write(full_path, contents);
                        }
                        None => {
                            let _ = std::fs::remove_file(full_path);
                        }
                    }
                }

                Err(write_error)
            }
        }
    }

    /// Create a commit including only the provided workdir-relative paths.
    ///
    /// # Errors
    ///
    /// Returns a `RegistryError` if HEAD cannot be set to main, index
    /// operations fail, a path contains `..`, or commit creation fails.
    fn commit_paths(
        &self,
        actor: &Actor,
        message: &CommitMessage,
        relative_paths: &[&Path],
    ) -> RegistryResult<git2::Oid> {
        let rendered = message.render_with_actor(actor)?;

        self.repo
            .set_head(MAIN_REF)
            .map_err(RegistryError::GitSetHead)?;
        let mut index = self.repo.index().map_err(RegistryError::GitIndex)?;

        for path in relative_paths {
            if path
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
            {
                return Err(RegistryError::InvalidInput(
                    "path must not contain parent directory references (..)".into(),
                ));
            }
            index.add_path(path).map_err(RegistryError::GitAdd)?;
        }
        index.write().map_err(RegistryError::GitIndex)?;

        let tree_id = index.write_tree().map_err(RegistryError::GitWriteTree)?;
        let tree = self
            .repo
            .find_tree(tree_id)
            .map_err(RegistryError::GitFindTree)?;

        let sig = git2::Signature::now(actor.name.as_str(), actor.email.as_str())
            .map_err(RegistryError::GitSignature)?;

        let parents = self.resolve_head_parents()?;
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();

        self.repo
            .commit(Some("HEAD"), &sig, &sig, &rendered, &tree, &parent_refs)
            .map_err(RegistryError::GitCommit)
    }

    /// Resolve the parent commit(s) for a new commit.
    ///
    /// - If `HEAD` exists and points to a commit, that commit is the single parent
    /// - If the repository is empty (unborn branch or not found), the parent list is empty
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::GitHead`] for any other HEAD lookup failure.
    fn resolve_head_parents(&self) -> RegistryResult<Vec<git2::Commit<'_>>> {
        match self.repo.head() {
            Ok(head) => {
                let commit = head.peel_to_commit().map_err(RegistryError::GitPeel)?;
                Ok(vec![commit])
            }
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(vec![]),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(vec![]),
            Err(e) => Err(RegistryError::GitHead(e)),
        }
    }
}
