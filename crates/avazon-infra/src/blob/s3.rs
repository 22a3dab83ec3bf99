//! S3 blob store on the AWS SDK.
//!
//! Only single-part `PutObject` is needed: artifacts are capped at
//! [`MAX_BLOB_SIZE_BYTES`](avazon_types::storage::MAX_BLOB_SIZE_BYTES) and
//! the bucket policy makes objects publicly readable.

use std::time::Duration;

use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use avazon_core::generation::{BlobStore, GeneratedMedia};
use avazon_types::error::ProviderError;

use super::{validate_name, validate_size};
use crate::providers::http;

/// Static keys. Without them the SDK's default credential chain is used.
pub struct S3Credentials {
    pub access_key_id: SecretString,
    pub secret_access_key: SecretString,
    pub session_token: Option<SecretString>,
}

pub struct S3BlobStore {
    client: Client,
    bucket: String,
    downloads: reqwest::Client,
}

/// Percent-encode a key for use as a URL path; `/` is kept.
fn path_escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            downloads: http::client(Duration::from_secs(300)),
        }
    }

    /// Build the SDK client for `region`, preferring `credentials` over the
    /// environment/profile chain.
    pub async fn connect(
        bucket: impl Into<String>,
        region: impl Into<String>,
        credentials: Option<S3Credentials>,
    ) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.into()));
        if let Some(credentials) = credentials {
            loader = loader.credentials_provider(Credentials::new(
                credentials.access_key_id.expose_secret(),
                credentials.secret_access_key.expose_secret(),
                credentials
                    .session_token
                    .as_ref()
                    .map(|t| t.expose_secret().to_string()),
                None,
                "avazon",
            ));
        }
        let shared = loader.load().await;
        Self::new(Client::new(&shared), bucket)
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.bucket, path_escape(key))
    }
}

impl BlobStore for S3BlobStore {
    async fn upload_public(&self, name: &str, bytes: Vec<u8>, mime_type: &str) -> Result<String, ProviderError> {
        validate_name(name)?;
        validate_size(bytes.len())?;

        let size = bytes.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .content_type(mime_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("s3 upload of {name} failed: {}", DisplayErrorContext(&e))))?;

        debug!(bucket = %self.bucket, key = name, size, "object uploaded");
        Ok(self.public_url(name))
    }

    async fn download(&self, url: &str) -> Result<GeneratedMedia, ProviderError> {
        http::fetch_media(&self.downloads, url).await
    }
}
