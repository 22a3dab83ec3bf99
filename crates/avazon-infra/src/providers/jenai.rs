//! JENAI text-to-music producer.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::info;

use avazon_core::generation::{GeneratedMedia, MusicPrompt, MusicProducer};
use avazon_types::error::ProviderError;

use super::http::{PollStatus, Poller, fetch_media, send_json};

#[derive(Debug, Serialize)]
struct GenerateRequest {
    prompt: String,
    duration: u32,
    format: &'static str,
    #[serde(rename = "fadeOutLength")]
    fade_out_length: u32,
}

impl From<&MusicPrompt> for GenerateRequest {
    fn from(prompt: &MusicPrompt) -> Self {
        Self {
            prompt: format!(
                "title: {}, style: {}, description: {}",
                prompt.title, prompt.style, prompt.description
            ),
            duration: prompt.duration_secs,
            format: "mp3",
            fade_out_length: 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    data: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct Track {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    data: TrackStatus,
}

#[derive(Debug, Deserialize)]
struct TrackStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    url: String,
    #[serde(default, rename = "failReason")]
    fail_reason: String,
}

fn track_status(status: TrackStatus) -> Result<PollStatus<String>, ProviderError> {
    match status.status.as_str() {
        "generating" | "validating" => Ok(PollStatus::Pending),
        "validated" if !status.url.is_empty() => Ok(PollStatus::Ready(status.url)),
        other => {
            let reason = if status.fail_reason.is_empty() {
                format!("track status '{other}'")
            } else {
                status.fail_reason
            };
            Err(ProviderError::Generation(reason))
        }
    }
}

pub struct JenaiMusic {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    poller: Poller,
}

impl JenaiMusic {
    pub fn new(base_url: impl Into<String>, api_key: SecretString, poll_interval: Duration, max_polls: u32) -> Self {
        Self {
            client: super::http::client(Duration::from_secs(120)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            poller: Poller::new(poll_interval, max_polls),
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }
}

impl MusicProducer for JenaiMusic {
    async fn produce(&self, prompt: &MusicPrompt) -> Result<GeneratedMedia, ProviderError> {
        let submitted: GenerateResponse = send_json(
            self.client
                .post(format!("{}/track/generate", self.base_url))
                .header(AUTHORIZATION, self.bearer())
                .json(&GenerateRequest::from(prompt)),
        )
        .await?;
        let track_id = submitted
            .data
            .into_iter()
            .next()
            .map(|t| t.id)
            .ok_or_else(|| ProviderError::Decode("no track id in response".to_string()))?;
        info!(track_id = %track_id, "music generation submitted");

        let status_url = format!("{}/generation_status/{track_id}", self.base_url);
        let url = self
            .poller
            .run(|| {
                let request = self.client.get(&status_url).header(AUTHORIZATION, self.bearer());
                async move {
                    let status: StatusResponse = send_json(request).await?;
                    track_status(status.data)
                }
            })
            .await?;

        let mut media = fetch_media(&self.client, &url).await?;
        if !media.mime_type.starts_with("audio/") {
            media.mime_type = "audio/mpeg".to_string();
        }
        Ok(media)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(json: &str) -> TrackStatus {
        serde_json::from_str::<StatusResponse>(json).unwrap().data
    }

    #[test]
    fn generate_request_formats_prompt() {
        let prompt = MusicPrompt {
            title: "Song".to_string(),
            style: "pop".to_string(),
            description: "upbeat".to_string(),
            duration_secs: 45,
        };
        let body = serde_json::to_value(GenerateRequest::from(&prompt)).unwrap();
        assert_eq!(body["prompt"], "title: Song, style: pop, description: upbeat");
        assert_eq!(body["duration"], 45);
        assert_eq!(body["format"], "mp3");
        assert_eq!(body["fadeOutLength"], 0);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(track_status(status(r#"{"data":{"status":"generating"}}"#)).unwrap(), PollStatus::Pending);
        assert_eq!(track_status(status(r#"{"data":{"status":"validating"}}"#)).unwrap(), PollStatus::Pending);
        assert_eq!(
            track_status(status(r#"{"data":{"status":"validated","url":"https://cdn/t.mp3"}}"#)).unwrap(),
            PollStatus::Ready("https://cdn/t.mp3".to_string())
        );
        match track_status(status(r#"{"data":{"status":"failed","failReason":"bad prompt"}}"#)) {
            Err(ProviderError::Generation(reason)) => assert_eq!(reason, "bad prompt"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(track_status(status(r#"{"data":{"status":"validated"}}"#)).is_err());
    }

    #[test]
    fn generate_response_without_tracks() {
        let parsed: GenerateResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(parsed.data.is_empty());
    }
}
