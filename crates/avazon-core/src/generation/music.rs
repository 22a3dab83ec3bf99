//! Text-to-music capability.

use std::future::Future;
use std::pin::Pin;

use avazon_types::error::ProviderError;

use super::GeneratedMedia;

/// What the music backend is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicPrompt {
    pub title: String,
    pub style: String,
    pub description: String,
    pub duration_secs: u32,
}

/// Trait for music backends. Produces an mp3 track.
pub trait MusicProducer: Send + Sync {
    fn produce(
        &self,
        prompt: &MusicPrompt,
    ) -> impl Future<Output = Result<GeneratedMedia, ProviderError>> + Send;
}

/// Object-safe version of [`MusicProducer`].
pub trait MusicProducerDyn: Send + Sync {
    fn produce_boxed<'a>(
        &'a self,
        prompt: &'a MusicPrompt,
    ) -> Pin<Box<dyn Future<Output = Result<GeneratedMedia, ProviderError>> + Send + 'a>>;
}

impl<T: MusicProducer> MusicProducerDyn for T {
    fn produce_boxed<'a>(
        &'a self,
        prompt: &'a MusicPrompt,
    ) -> Pin<Box<dyn Future<Output = Result<GeneratedMedia, ProviderError>> + Send + 'a>> {
        Box::pin(self.produce(prompt))
    }
}

/// Type-erased music producer.
pub struct BoxMusicProducer {
    inner: Box<dyn MusicProducerDyn>,
}

impl BoxMusicProducer {
    pub fn new<T: MusicProducer + 'static>(producer: T) -> Self {
        Self {
            inner: Box::new(producer),
        }
    }

    pub async fn produce(&self, prompt: &MusicPrompt) -> Result<GeneratedMedia, ProviderError> {
        self.inner.produce_boxed(prompt).await
    }
}
