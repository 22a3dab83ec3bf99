//! Public artifact storage capability.

use std::future::Future;
use std::pin::Pin;

use avazon_types::error::ProviderError;

use super::GeneratedMedia;

/// Trait for blob stores that hand back publicly readable URLs.
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `name` and return its public URL.
    fn upload_public(
        &self,
        name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Fetch an artifact previously returned by `upload_public` (or any
    /// public URL).
    fn download(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<GeneratedMedia, ProviderError>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Object-safe version of [`BlobStore`].
pub trait BlobStoreDyn: Send + Sync {
    fn upload_public_boxed<'a>(
        &'a self,
        name: &'a str,
        bytes: Vec<u8>,
        mime_type: &'a str,
    ) -> BoxFuture<'a, String>;
    fn download_boxed<'a>(&'a self, url: &'a str) -> BoxFuture<'a, GeneratedMedia>;
}

impl<T: BlobStore> BlobStoreDyn for T {
    fn upload_public_boxed<'a>(
        &'a self,
        name: &'a str,
        bytes: Vec<u8>,
        mime_type: &'a str,
    ) -> BoxFuture<'a, String> {
        Box::pin(self.upload_public(name, bytes, mime_type))
    }

    fn download_boxed<'a>(&'a self, url: &'a str) -> BoxFuture<'a, GeneratedMedia> {
        Box::pin(self.download(url))
    }
}

/// Type-erased blob store.
pub struct BoxBlobStore {
    inner: Box<dyn BlobStoreDyn>,
}

impl BoxBlobStore {
    pub fn new<T: BlobStore + 'static>(store: T) -> Self {
        Self {
            inner: Box::new(store),
        }
    }

    pub async fn upload_public(
        &self,
        name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<String, ProviderError> {
        self.inner.upload_public_boxed(name, bytes, mime_type).await
    }

    /// Convenience for storing a generated artifact under `stem` plus the
    /// extension matching its MIME type.
    pub async fn upload_media(
        &self,
        stem: &str,
        media: GeneratedMedia,
    ) -> Result<String, ProviderError> {
        let name = format!("{stem}{}", media.extension());
        self.upload_public(&name, media.bytes, &media.mime_type).await
    }

    pub async fn download(&self, url: &str) -> Result<GeneratedMedia, ProviderError> {
        self.inner.download_boxed(url).await
    }
}
