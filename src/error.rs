/*!
 * defines the [Error] and [Result] types.
*/

use thiserror::Error;

/// Error type for every fallible operation in this crate. Each IO stage
/// wraps its cause so callers can tell which step of a commit failed.
#[derive(Error, Debug)]
pub enum Error {
    /// The requested table or object does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// A table already exists at the target path.
    #[error("table already exists at {0}")]
    AlreadyExists(String),
    /// The table metadata document could not be read or parsed.
    #[error("failed to load table metadata: {0}")]
    MetadataLoad(#[source] Box<Error>),
    /// The table metadata document or version hint could not be written.
    #[error("failed to save table metadata: {0}")]
    MetadataSave(#[source] Box<Error>),
    /// The manifest file could not be uploaded.
    #[error("failed to upload manifest: {0}")]
    ManifestUpload(#[source] Box<Error>),
    /// The manifest list file could not be uploaded.
    #[error("failed to upload manifest list: {0}")]
    ManifestListUpload(#[source] Box<Error>),
    /// The compute backend failed to write data files.
    #[error("failed to copy data files: {0}")]
    CopyFailed(String),
    /// A file glob did not match the allowed pattern.
    #[error("invalid file pattern: {0}")]
    InvalidFilePattern(String),
    /// A schema evolution rule was violated.
    #[error("schema validation failed: {0}")]
    Validation(String),
    /// A value could not be represented in the requested Iceberg type.
    #[error("invalid value: {0}")]
    InvalidValue(String),
    /// The compute backend returned an error.
    #[error("compute error: {0}")]
    Compute(String),
    /// Error from the underlying object store.
    #[error(transparent)]
    ObjectStore(#[from] object_store::Error),
    /// Error serializing or deserializing JSON.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True if this error (or its wrapped cause) is a not-found condition.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::ObjectStore(object_store::Error::NotFound { .. }) => true,
            Error::MetadataLoad(inner) => inner.is_not_found(),
            _ => false,
        }
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
