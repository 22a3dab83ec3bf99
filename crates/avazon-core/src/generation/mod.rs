//! External generation capabilities (ports).
//!
//! Each capability is an RPITIT trait with an object-safe `Box*` wrapper,
//! so services can hold whichever backend was configured at startup:
//!
//! - [`painter::ImagePainter`]: text/image-to-image and style transfer
//! - [`voice::VoiceSynthesizer`]: voice design and text-to-speech
//! - [`video::VideoProducer`]: image-to-video
//! - [`music::MusicProducer`]: text-to-music
//! - [`blob::BlobStore`]: public artifact storage

pub mod blob;
pub mod music;
pub mod painter;
pub mod video;
pub mod voice;

use std::sync::Arc;

pub use blob::{BlobStore, BoxBlobStore};
pub use music::{BoxMusicProducer, MusicProducer, MusicPrompt};
pub use painter::{BoxImagePainter, ImagePainter, PaintRequest};
pub use video::{BoxVideoProducer, VideoProducer};
pub use voice::{BoxVoiceSynthesizer, DesignedVoice, VoiceDesign, VoiceSynthesizer};

/// A binary artifact and its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedMedia {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl GeneratedMedia {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// File extension (with dot) matching the MIME type.
    pub fn extension(&self) -> &'static str {
        avazon_types::storage::extension_for_mime(&self.mime_type)
    }
}

/// The full set of configured capabilities, shared by every service.
#[derive(Clone)]
pub struct Generators {
    pub painter: Arc<BoxImagePainter>,
    pub voice: Arc<BoxVoiceSynthesizer>,
    pub video: Arc<BoxVideoProducer>,
    pub music: Arc<BoxMusicProducer>,
    pub blobs: Arc<BoxBlobStore>,
}
