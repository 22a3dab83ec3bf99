//! Image generation capability.

use std::future::Future;
use std::pin::Pin;

use avazon_types::error::ProviderError;

use super::GeneratedMedia;

/// Negative prompt used for every avatar portrait.
pub const NEGATIVE_PROMPT: &str = "worst quality, bad quality, lowres, bad anatomy, bad proportions, \
bad face, bad hands, missing limb, extra digits, fewer digits, cropped head, mutation, deformed, \
disfigured, text, watermark, jpeg artifacts";

/// Profile portraits are square.
pub const PORTRAIT_SIZE: (u32, u32) = (1024, 1024);

/// Video thumbnails match the video producer's landscape ratio.
pub const THUMBNAIL_SIZE: (u32, u32) = (1280, 768);

/// A text-to-image request, optionally anchored to a reference image.
#[derive(Debug, Clone)]
pub struct PaintRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub width: u32,
    pub height: u32,
    /// When set, the painter keeps the subject of this image (e.g. the
    /// avatar's face) and repaints it according to `prompt`.
    pub reference: Option<GeneratedMedia>,
}

impl PaintRequest {
    pub fn portrait(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: NEGATIVE_PROMPT.to_string(),
            width: PORTRAIT_SIZE.0,
            height: PORTRAIT_SIZE.1,
            reference: None,
        }
    }

    pub fn with_size(mut self, (width, height): (u32, u32)) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_reference(mut self, reference: GeneratedMedia) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// Trait for image generation backends.
pub trait ImagePainter: Send + Sync {
    fn paint(
        &self,
        request: &PaintRequest,
    ) -> impl Future<Output = Result<GeneratedMedia, ProviderError>> + Send;

    /// Rewrite a short description into a detailed generation prompt.
    fn enhance_prompt(
        &self,
        prompt: &str,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send;

    /// Repaint `image` in a new style while keeping its subject.
    fn change_style(
        &self,
        image: &GeneratedMedia,
        prompt: &str,
    ) -> impl Future<Output = Result<GeneratedMedia, ProviderError>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Object-safe version of [`ImagePainter`].
pub trait ImagePainterDyn: Send + Sync {
    fn paint_boxed<'a>(&'a self, request: &'a PaintRequest) -> BoxFuture<'a, GeneratedMedia>;
    fn enhance_prompt_boxed<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, String>;
    fn change_style_boxed<'a>(
        &'a self,
        image: &'a GeneratedMedia,
        prompt: &'a str,
    ) -> BoxFuture<'a, GeneratedMedia>;
}

impl<T: ImagePainter> ImagePainterDyn for T {
    fn paint_boxed<'a>(&'a self, request: &'a PaintRequest) -> BoxFuture<'a, GeneratedMedia> {
        Box::pin(self.paint(request))
    }

    fn enhance_prompt_boxed<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, String> {
        Box::pin(self.enhance_prompt(prompt))
    }

    fn change_style_boxed<'a>(
        &'a self,
        image: &'a GeneratedMedia,
        prompt: &'a str,
    ) -> BoxFuture<'a, GeneratedMedia> {
        Box::pin(self.change_style(image, prompt))
    }
}

/// Type-erased image painter.
pub struct BoxImagePainter {
    inner: Box<dyn ImagePainterDyn>,
}

impl BoxImagePainter {
    pub fn new<T: ImagePainter + 'static>(painter: T) -> Self {
        Self {
            inner: Box::new(painter),
        }
    }

    pub async fn paint(&self, request: &PaintRequest) -> Result<GeneratedMedia, ProviderError> {
        self.inner.paint_boxed(request).await
    }

    pub async fn enhance_prompt(&self, prompt: &str) -> Result<String, ProviderError> {
        self.inner.enhance_prompt_boxed(prompt).await
    }

    pub async fn change_style(
        &self,
        image: &GeneratedMedia,
        prompt: &str,
    ) -> Result<GeneratedMedia, ProviderError> {
        self.inner.change_style_boxed(image, prompt).await
    }
}
