//! Runway image-to-video producer (public developer API).

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::info;

use avazon_core::generation::{GeneratedMedia, VideoProducer};
use avazon_types::error::ProviderError;

use super::http::{PollStatus, Poller, fetch_media, send_json};

const API_VERSION_HEADER: &str = "X-Runway-Version";
const API_VERSION: &str = "2024-11-06";
const MODEL: &str = "gen3a_turbo";
const DURATION_SECS: u32 = 10;
const RATIO: &str = "1280:768";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageToVideoRequest<'a> {
    prompt_image: &'a str,
    prompt_text: &'a str,
    model: &'static str,
    duration: u32,
    ratio: &'static str,
}

#[derive(Debug, Deserialize)]
struct TaskCreated {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Task {
    status: String,
    #[serde(default)]
    output: Vec<String>,
    failure: Option<String>,
}

fn task_status(task: Task) -> Result<PollStatus<String>, ProviderError> {
    match task.status.as_str() {
        "PENDING" | "RUNNING" | "THROTTLED" => Ok(PollStatus::Pending),
        "SUCCEEDED" => task
            .output
            .into_iter()
            .next()
            .map(PollStatus::Ready)
            .ok_or_else(|| ProviderError::Decode("task succeeded without output".to_string())),
        "FAILED" => Err(ProviderError::Generation(
            task.failure.unwrap_or_else(|| "video task failed".to_string()),
        )),
        other => Err(ProviderError::Generation(format!("unexpected task status '{other}'"))),
    }
}

pub struct RunwayVideo {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    poller: Poller,
}

impl RunwayVideo {
    pub fn new(base_url: impl Into<String>, api_key: SecretString, poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            client: super::http::client(Duration::from_secs(120)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            poller: Poller::new(poll_interval, max_polls),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}{path}", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key.expose_secret()))
            .header(API_VERSION_HEADER, API_VERSION)
    }
}

impl VideoProducer for RunwayVideo {
    async fn create_video(&self, image_url: &str, prompt: &str) -> Result<GeneratedMedia, ProviderError> {
        let created: TaskCreated = send_json(self.request(reqwest::Method::POST, "/image_to_video").json(
            &ImageToVideoRequest {
                prompt_image: image_url,
                prompt_text: prompt,
                model: MODEL,
                duration: DURATION_SECS,
                ratio: RATIO,
            },
        ))
        .await?;
        info!(task_id = %created.id, "video generation submitted");

        let task_path = format!("/tasks/{}", created.id);
        let url = self
            .poller
            .run(|| {
                let request = self.request(reqwest::Method::GET, &task_path);
                async move { task_status(send_json::<Task>(request).await?) }
            })
            .await?;

        let mut media = fetch_media(&self.client, &url).await?;
        if !media.mime_type.starts_with("video/") {
            media.mime_type = "video/mp4".to_string();
        }
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(json: &str) -> Task {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn request_uses_camel_case() {
        let body = serde_json::to_value(ImageToVideoRequest {
            prompt_image: "https://cdn/thumb.jpg",
            prompt_text: "waves",
            model: MODEL,
            duration: DURATION_SECS,
            ratio: RATIO,
        })
        .unwrap();
        assert_eq!(body["promptImage"], "https://cdn/thumb.jpg");
        assert_eq!(body["promptText"], "waves");
        assert_eq!(body["model"], "gen3a_turbo");
        assert_eq!(body["ratio"], "1280:768");
        assert_eq!(body["duration"], 10);
    }

    #[test]
    fn task_statuses() {
        for pending in ["PENDING", "RUNNING", "THROTTLED"] {
            let json = format!(r#"{{"status":"{pending}"}}"#);
            assert_eq!(task_status(task(&json)).unwrap(), PollStatus::Pending);
        }
        assert_eq!(
            task_status(task(r#"{"status":"SUCCEEDED","output":["https://cdn/v.mp4"]}"#)).unwrap(),
            PollStatus::Ready("https://cdn/v.mp4".to_string())
        );
        match task_status(task(r#"{"status":"FAILED","failure":"nsfw"}"#)) {
            Err(ProviderError::Generation(reason)) => assert_eq!(reason, "nsfw"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(
            task_status(task(r#"{"status":"SUCCEEDED","output":[]}"#)),
            Err(ProviderError::Decode(_))
        ));
    }
}
