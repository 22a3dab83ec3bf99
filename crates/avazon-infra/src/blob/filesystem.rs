//! Filesystem blob store.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use avazon_core::generation::{BlobStore, GeneratedMedia};
use avazon_types::error::ProviderError;
use avazon_types::storage::mime_for_name;

use super::{validate_name, validate_size};
use crate::providers::http;

/// Stores blobs as flat files in `dir` and hands out
/// `{public_base_url}/{name}` URLs.
pub struct FilesystemBlobStore {
    dir: PathBuf,
    public_base_url: String,
    client: reqwest::Client,
}

impl FilesystemBlobStore {
    pub fn new(dir: PathBuf, public_base_url: impl Into<String>) -> Self {
        Self {
            dir,
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
            client: http::client(Duration::from_secs(120)),
        }
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    /// The local file name behind one of our own public URLs.
    fn local_name<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(&self.public_base_url)?.strip_prefix('/')
    }
}

impl BlobStore for FilesystemBlobStore {
    async fn upload_public(&self, name: &str, bytes: Vec<u8>, mime_type: &str) -> Result<String, ProviderError> {
        validate_name(name)?;
        validate_size(bytes.len())?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| ProviderError::Request(format!("failed to create blob dir: {e}")))?;
        let path = self.dir.join(name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| ProviderError::Request(format!("failed to write {}: {e}", path.display())))?;

        debug!(name, mime_type, size = bytes.len(), "blob stored");
        Ok(format!("{}/{name}", self.public_base_url))
    }

    async fn download(&self, url: &str) -> Result<GeneratedMedia, ProviderError> {
        let Some(name) = self.local_name(url) else {
            return http::fetch_media(&self.client, url).await;
        };
        validate_name(name)?;
        let bytes = tokio::fs::read(self.dir.join(name))
            .await
            .map_err(|e| ProviderError::Request(format!("failed to read blob '{name}': {e}")))?;
        Ok(GeneratedMedia::new(bytes, mime_for_name(name)))
    }
}
