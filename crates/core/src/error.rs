#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid NHS number")]
    InvalidNhsNumber,
    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to create record directory: {0}")]
    RecordDirCreation(std::io::Error),
    #[error(
        "initialise failed and cleanup also failed (path: {path}): init={init_error}; cleanup={cleanup_error}",
        path = path.display()
    )]
    CleanupAfterInitialiseFailed {
        path: std::path::PathBuf,
        #[source]
        init_error: Box<RegistryError>,
        cleanup_error: std::io::Error,
    },
    #[error("failed to write record file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to read record file: {0}")]
    FileRead(std::io::Error),

    #[error("a registered manager with CQC ID '{0}' already exists")]
    DuplicateManagerId(String),
    #[error("a care recipient with this pseudonymised identifier already exists")]
    DuplicatePseudonym,
    #[error("registered manager not found: {0}")]
    UnknownManager(hans_uuid::RecordUuid),
    #[error("care provider location not found: {0}")]
    UnknownLocation(hans_uuid::RecordUuid),

    #[error("FHIR boundary error: {0}")]
    Fhir(#[from] hans_fhir::FhirError),
    #[error("identifier error: {0}")]
    Uuid(#[from] hans_uuid::UuidError),
    #[error("subscription error: {0}")]
    Subscription(#[from] crate::subscription::SubscriptionError),

    #[error("failed to initialise git repository: {0}")]
    GitInit(git2::Error),
    #[error("failed to open git repository: {0}")]
    GitOpen(git2::Error),
    #[error("failed to access git index: {0}")]
    GitIndex(git2::Error),
    #[error("failed to add file to git index: {0}")]
    GitAdd(git2::Error),
    #[error("failed to write git tree: {0}")]
    GitWriteTree(git2::Error),
    #[error("failed to find git tree: {0}")]
    GitFindTree(git2::Error),
    #[error("failed to create git signature: {0}")]
    GitSignature(git2::Error),
    #[error("failed to create git commit: {0}")]
    GitCommit(git2::Error),
    #[error("failed to get git head: {0}")]
    GitHead(git2::Error),
    #[error("failed to set git head: {0}")]
    GitSetHead(git2::Error),
    #[error("failed to peel git commit: {0}")]
    GitPeel(git2::Error),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
