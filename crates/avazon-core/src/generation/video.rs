//! Image-to-video capability.

use std::future::Future;
use std::pin::Pin;

use avazon_types::error::ProviderError;

use super::GeneratedMedia;

/// Trait for video backends. `image_url` must be publicly reachable.
pub trait VideoProducer: Send + Sync {
    fn create_video(
        &self,
        image_url: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<GeneratedMedia, ProviderError>> + Send;
}

/// Object-safe version of [`VideoProducer`].
pub trait VideoProducerDyn: Send + Sync {
    fn create_video_boxed<'a>(
        &'a self,
        image_url: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<GeneratedMedia, ProviderError>> + Send + 'a>>;
}

impl<T: VideoProducer> VideoProducerDyn for T {
    fn create_video_boxed<'a>(
        &'a self,
        image_url: &'a str,
        prompt: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<GeneratedMedia, ProviderError>> + Send + 'a>> {
        Box::pin(self.create_video(image_url, prompt))
    }
}

/// Type-erased video producer.
pub struct BoxVideoProducer {
    inner: Box<dyn VideoProducerDyn>,
}

impl BoxVideoProducer {
    pub fn new<T: VideoProducer + 'static>(producer: T) -> Self {
        Self {
            inner: Box::new(producer),
        }
    }

    pub async fn create_video(
        &self,
        image_url: &str,
        prompt: &str,
    ) -> Result<GeneratedMedia, ProviderError> {
        self.inner.create_video_boxed(image_url, prompt).await
    }
}
