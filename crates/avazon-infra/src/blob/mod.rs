//! Public blob stores for generated artifacts.
//!
//! - [`FilesystemBlobStore`]: files under the data dir, served by the API
//!   at `storage.public_base_url`
//! - [`S3BlobStore`]: objects in a public-read S3 bucket, uploaded with
//!   the AWS SDK

pub mod filesystem;
pub mod s3;

pub use filesystem::FilesystemBlobStore;
pub use s3::{S3BlobStore, S3Credentials};

use avazon_types::error::ProviderError;
use avazon_types::storage::MAX_BLOB_SIZE_BYTES;

/// Reject object names that could escape the store's namespace.
pub(crate) fn validate_name(name: &str) -> Result<(), ProviderError> {
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(ProviderError::Request(format!("invalid blob name '{name}'")));
    }
    Ok(())
}

pub(crate) fn validate_size(len: usize) -> Result<(), ProviderError> {
    if len > MAX_BLOB_SIZE_BYTES {
        return Err(ProviderError::Request(format!(
            "blob exceeds maximum size of {MAX_BLOB_SIZE_BYTES} bytes (got {len} bytes)"
        )));
    }
    Ok(())
}
