//! OpenArt image painter (Flux text-to-image, image-to-image and the
//! "creative variations" style-transfer app).
//!
//! Generation endpoints authenticate with the web session cookie; the
//! prompt and app endpoints take the same key as a bearer token.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, COOKIE};
use reqwest::multipart::{Form, Part};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use avazon_core::generation::{GeneratedMedia, ImagePainter, PaintRequest};
use avazon_types::error::ProviderError;

use super::http::{PollStatus, Poller, fetch_media, send_json};

const SESSION_COOKIE: &str = "__Secure-next-auth.session-token";
const FLUX_MODEL: &str = "Flux_dev";
const SAMPLER: &str = "DPM++ 2M SDE Karras";
const REFERENCE_STRENGTH: f64 = 0.8;
const PROMPT_MODEL: &str = "gpt-4o-mini";
/// Polls that may come back with no images before the job counts as lost.
const MAX_EMPTY_POLLS: u32 = 3;

#[derive(Debug, Serialize)]
struct FluxRequest<'a> {
    prompt: &'a str,
    #[serde(rename = "isGeneratedPrompt")]
    is_generated_prompt: bool,
    image_num: u32,
    width: u32,
    height: u32,
    steps: u32,
    cfg_scale: f32,
    prompt_assistant_mode: &'static str,
    base_model: &'static str,
    ai_model: &'static str,
    #[serde(skip_serializing_if = "str::is_empty")]
    negative_prompt: &'a str,
    tiling: bool,
    sampler: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    strength: Option<f64>,
}

impl<'a> FluxRequest<'a> {
    fn new(request: &'a PaintRequest, reference_url: Option<&'a str>) -> Self {
        Self {
            prompt: &request.prompt,
            is_generated_prompt: true,
            image_num: 1,
            width: request.width,
            height: request.height,
            steps: 28,
            cfg_scale: 3.5,
            prompt_assistant_mode: "off",
            base_model: FLUX_MODEL,
            ai_model: FLUX_MODEL,
            negative_prompt: &request.negative_prompt,
            tiling: false,
            sampler: SAMPLER,
            image_url: reference_url,
            strength: reference_url.map(|_| REFERENCE_STRENGTH),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FluxResponse {
    #[serde(default)]
    generation_history_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
struct VariationRequest<'a> {
    app_name: &'static str,
    image_num: u32,
    similarity: u32,
    style: &'static str,
    subject_description: &'a str,
    upload_image_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct AppResponse {
    #[serde(default)]
    generation_history_id: String,
}

#[derive(Debug, Deserialize)]
struct PlaceholderResponse {
    #[serde(default)]
    images: Vec<PlaceholderImage>,
}

#[derive(Debug, Deserialize)]
struct PlaceholderImage {
    #[serde(default)]
    url: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "imageUrl")]
    image_url: String,
}

#[derive(Debug, Deserialize)]
struct EnhancedPrompt {
    prompt: String,
}

/// What one placeholder check says about a generation.
#[derive(Debug, PartialEq, Eq)]
enum ImageState {
    Completed(String),
    Pending,
    Empty,
    Failed,
}

fn image_state(placeholder: &PlaceholderResponse) -> ImageState {
    if placeholder.images.is_empty() {
        return ImageState::Empty;
    }
    if let Some(done) = placeholder.images.iter().find(|i| i.status == "completed") {
        return ImageState::Completed(done.url.clone());
    }
    if placeholder.images.iter().any(|i| i.status == "pending") {
        ImageState::Pending
    } else {
        ImageState::Failed
    }
}

/// Previews are served as 512px webp; the raw jpeg sits next to them.
fn full_quality_url(url: &str) -> String {
    url.replacen("_512.webp", "_raw.jpg", 1)
}

pub struct OpenArtPainter {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    poller: Poller,
}

impl OpenArtPainter {
    pub fn new(base_url: impl Into<String>, api_key: SecretString, poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            client: super::http::client(Duration::from_secs(120)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            poller: Poller::new(poll_interval, max_polls),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn cookie(&self) -> String {
        format!("{SESSION_COOKIE}={}", self.api_key.expose_secret())
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }

    async fn upload(&self, image: &GeneratedMedia) -> Result<String, ProviderError> {
        let part = Part::bytes(image.bytes.clone())
            .file_name(format!("image{}", image.extension()))
            .mime_str(&image.mime_type)
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        let response: UploadResponse = send_json(
            self.client
                .post(self.url("/media/upload_image"))
                .header(COOKIE, self.cookie())
                .multipart(Form::new().part("file", part)),
        )
        .await?;
        debug!(url = %response.image_url, "reference image uploaded");
        Ok(response.image_url)
    }

    /// Poll the placeholder endpoint until the image is done, then fetch it.
    async fn collect(&self, generation_id: &str) -> Result<GeneratedMedia, ProviderError> {
        let url = self.url("/create/image_placeholder");
        let mut polls = 0;

        let image_url = self
            .poller
            .run(|| {
                let request = self
                    .client
                    .get(&url)
                    .query(&[("generation_history_id", generation_id)])
                    .header(COOKIE, self.cookie());
                polls += 1;
                let polls_so_far = polls;
                async move {
                    let placeholder: PlaceholderResponse = send_json(request).await?;
                    match image_state(&placeholder) {
                        ImageState::Completed(url) => Ok(PollStatus::Ready(url)),
                        ImageState::Pending => Ok(PollStatus::Pending),
                        ImageState::Empty if polls_so_far <= MAX_EMPTY_POLLS => Ok(PollStatus::Pending),
                        ImageState::Empty | ImageState::Failed => {
                            Err(ProviderError::Generation("no completed images found".to_string()))
                        }
                    }
                }
            })
            .await?;

        fetch_media(&self.client, &full_quality_url(&image_url)).await
    }
}

impl ImagePainter for OpenArtPainter {
    async fn paint(&self, request: &PaintRequest) -> Result<GeneratedMedia, ProviderError> {
        let reference_url = match &request.reference {
            Some(reference) => Some(self.upload(reference).await?),
            None => None,
        };

        let response: FluxResponse = send_json(
            self.client
                .post(self.url("/create/flux"))
                .header(COOKIE, self.cookie())
                .json(&FluxRequest::new(request, reference_url.as_deref())),
        )
        .await?;
        let generation_id = response
            .generation_history_ids
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Decode("no generation history id".to_string()))?;
        info!(generation_id = %generation_id, reference = reference_url.is_some(), "image generation submitted");

        self.collect(&generation_id).await
    }

    async fn enhance_prompt(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = serde_json::json!({
            "prompt": prompt,
            "num_return_sequences": 1,
            "model": PROMPT_MODEL,
        });
        let prompts: Vec<EnhancedPrompt> = send_json(
            self.client
                .post(self.url("/common/prompt"))
                .header(AUTHORIZATION, self.bearer())
                .json(&body),
        )
        .await?;
        prompts
            .into_iter()
            .next()
            .map(|p| p.prompt)
            .ok_or_else(|| ProviderError::Decode("no enhanced prompt in response".to_string()))
    }

    async fn change_style(&self, image: &GeneratedMedia, prompt: &str) -> Result<GeneratedMedia, ProviderError> {
        let upload_url = self.upload(image).await?;
        let response: AppResponse = send_json(
            self.client
                .post(self.url("/apps/create"))
                .header(AUTHORIZATION, self.bearer())
                .json(&VariationRequest {
                    app_name: "creative-variations",
                    image_num: 1,
                    similarity: 1,
                    style: "Default",
                    subject_description: prompt,
                    upload_image_url: &upload_url,
                }),
        )
        .await?;
        if response.generation_history_id.is_empty() {
            return Err(ProviderError::Decode("no generation history id".to_string()));
        }
        info!(generation_id = %response.generation_history_id, "style change submitted");

        self.collect(&response.generation_history_id).await
    }
}
