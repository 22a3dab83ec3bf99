//! Generation providers behind the core capability traits.
//!
//! - [`openart::OpenArtPainter`]: image painting and style transfer
//! - [`elevenlabs::ElevenLabsVoice`]: voice design and text-to-speech
//! - [`runway::RunwayVideo`]: image-to-video
//! - [`jenai::JenaiMusic`]: text-to-music
//!
//! [`build_generators`] wires them together with the configured blob store.

pub mod elevenlabs;
pub(crate) mod http;
pub mod jenai;
pub mod openart;
pub mod runway;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use avazon_core::generation::{
    BoxBlobStore, BoxImagePainter, BoxMusicProducer, BoxVideoProducer, BoxVoiceSynthesizer, Generators,
};
use avazon_types::config::{AppConfig, StorageBackend};

use crate::blob::{FilesystemBlobStore, S3BlobStore, S3Credentials};
use crate::config::Secrets;

/// A missing key still builds the provider; its calls then fail with the
/// provider's authentication error and the job records that reason.
fn key_or_empty(key: &Option<SecretString>) -> SecretString {
    SecretString::from(key.as_ref().map(|k| k.expose_secret()).unwrap_or_default())
}

/// Build the configured blob store.
pub async fn build_blob_store(config: &AppConfig, secrets: &Secrets, data_dir: &Path) -> BoxBlobStore {
    match config.storage.backend {
        StorageBackend::Filesystem => BoxBlobStore::new(FilesystemBlobStore::new(
            data_dir.join(&config.storage.blob_dir),
            config.storage.public_base_url.clone(),
        )),
        StorageBackend::S3 => {
            let credentials = match (&secrets.aws_access_key_id, &secrets.aws_secret_access_key) {
                (Some(id), Some(secret)) => Some(S3Credentials {
                    access_key_id: SecretString::from(id.expose_secret()),
                    secret_access_key: SecretString::from(secret.expose_secret()),
                    session_token: secrets
                        .aws_session_token
                        .as_ref()
                        .map(|t| SecretString::from(t.expose_secret())),
                }),
                _ => None,
            };
            BoxBlobStore::new(
                S3BlobStore::connect(
                    config.storage.bucket.clone(),
                    config.storage.region.clone(),
                    credentials,
                )
                .await,
            )
        }
    }
}

/// Build every generation capability from config and secrets.
pub async fn build_generators(config: &AppConfig, secrets: &Secrets, data_dir: &Path) -> Generators {
    let p = &config.providers;
    Generators {
        painter: Arc::new(BoxImagePainter::new(openart::OpenArtPainter::new(
            p.openart_base_url.clone(),
            key_or_empty(&secrets.openart_api_key),
            Duration::from_secs(p.image_poll_secs),
            p.max_polls,
        ))),
        voice: Arc::new(BoxVoiceSynthesizer::new(elevenlabs::ElevenLabsVoice::new(
            p.elevenlabs_base_url.clone(),
            key_or_empty(&secrets.elevenlabs_api_key),
        ))),
        video: Arc::new(BoxVideoProducer::new(runway::RunwayVideo::new(
            p.runway_base_url.clone(),
            key_or_empty(&secrets.runway_api_key),
            Duration::from_secs(p.video_poll_secs),
            p.max_polls,
        ))),
        music: Arc::new(BoxMusicProducer::new(jenai::JenaiMusic::new(
            p.jenai_base_url.clone(),
            key_or_empty(&secrets.jenai_api_key),
            Duration::from_secs(p.music_poll_secs),
            p.max_polls,
        ))),
        blobs: Arc::new(build_blob_store(config, secrets, data_dir).await),
    }
}
