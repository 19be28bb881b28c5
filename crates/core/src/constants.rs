//! Constants used throughout the HANS core crate.
//!
//! This module contains all path and filename constants to ensure
//! consistency across the codebase and make maintenance easier.

/// Default directory for registry data storage when no explicit directory is configured.
pub const DEFAULT_REGISTRY_DATA_DIR: &str = "registry_data";

/// Directory name for registered-manager records storage.
pub const MANAGERS_DIR_NAME: &str = "managers";

/// Directory name for care-provider-location records storage.
pub const LOCATIONS_DIR_NAME: &str = "locations";

/// Directory name for care-recipient records storage.
pub const RECIPIENTS_DIR_NAME: &str = "recipients";

/// Filename for registered-manager resource files.
pub const MANAGER_FILE_NAME: &str = "manager.yaml";

/// Filename for care-provider-location resource files.
pub const LOCATION_FILE_NAME: &str = "location.yaml";

/// Filename for care-recipient resource files.
pub const RECIPIENT_FILE_NAME: &str = "recipient.yaml";

/// Default pseudonym salt for development environments.
pub const DEFAULT_PSEUDONYM_SALT: &str = "hans.dev.1";

/// Default `.gitignore` content written into every record repository.
pub const DEFAULT_GITIGNORE: &str = "*.tmp\n";
