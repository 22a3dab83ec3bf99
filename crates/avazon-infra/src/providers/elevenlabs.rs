//! ElevenLabs voice designer and text-to-speech.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::info;

use avazon_core::generation::{DesignedVoice, GeneratedMedia, VoiceDesign, VoiceSynthesizer};
use avazon_types::error::ProviderError;

use super::http::{send, send_json};

pub const PROVIDER: &str = "elevenlabs";
const API_KEY_HEADER: &str = "XI-API-KEY";
const GENERATED_VOICE_HEADER: &str = "generated_voice_id";
const TTS_MODEL: &str = "eleven_multilingual_v2";

#[derive(Debug, Serialize)]
struct GenerateVoiceRequest {
    accent: String,
    accent_strength: f64,
    age: String,
    gender: String,
    text: String,
}

impl From<&VoiceDesign> for GenerateVoiceRequest {
    fn from(design: &VoiceDesign) -> Self {
        Self {
            accent: design.accent.to_string(),
            accent_strength: design.accent_strength,
            age: design.age.to_string(),
            gender: design.gender.to_string(),
            text: design.bounded_prompt(),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateVoiceRequest<'a> {
    voice_name: &'a str,
    voice_description: &'static str,
    generated_voice_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateVoiceResponse {
    voice_id: String,
}

#[derive(Debug, Serialize)]
struct SpeechRequest<'a> {
    text: &'a str,
    model_id: &'static str,
}

pub struct ElevenLabsVoice {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl ElevenLabsVoice {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            client: super::http::client(Duration::from_secs(120)),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{path}", self.base_url))
            .header(API_KEY_HEADER, self.api_key.expose_secret())
    }
}

impl VoiceSynthesizer for ElevenLabsVoice {
    /// Generate a preview voice from the design, then save it to the
    /// account so it can be used for speech.
    async fn design_voice(&self, design: &VoiceDesign) -> Result<DesignedVoice, ProviderError> {
        let response = send(
            self.post("/voice-generation/generate-voice")
                .json(&GenerateVoiceRequest::from(design)),
        )
        .await?;
        let generated_id = response
            .headers()
            .get(GENERATED_VOICE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Decode(format!("missing {GENERATED_VOICE_HEADER} header")))?;

        let saved: CreateVoiceResponse = send_json(self.post("/voice-generation/create-voice").json(
            &CreateVoiceRequest {
                voice_name: &generated_id,
                voice_description: "Generated voice from API request",
                generated_voice_id: &generated_id,
            },
        ))
        .await?;
        info!(voice_id = %saved.voice_id, "voice designed");

        Ok(DesignedVoice {
            provider: PROVIDER.to_string(),
            voice_id: saved.voice_id,
        })
    }

    async fn text_to_speech(&self, voice_id: &str, text: &str) -> Result<GeneratedMedia, ProviderError> {
        let response = send(
            self.post(&format!("/text-to-speech/{voice_id}"))
                .json(&SpeechRequest { text, model_id: TTS_MODEL }),
        )
        .await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Request(e.to_string()))?;
        if bytes.is_empty() {
            return Err(ProviderError::Generation("empty audio response".to_string()));
        }
        Ok(GeneratedMedia::new(bytes.to_vec(), "audio/mpeg"))
    }
}

#[cfg(test)]
mod tests {
    use avazon_types::tool::{VoiceAccent, VoiceAge, VoiceGender};

    use super::*;

    #[test]
    fn generate_request_uses_lowercase_labels() {
        let design = VoiceDesign {
            prompt: "A warm, calm narrator who speaks slowly.".to_string(),
            gender: VoiceGender::Male,
            age: VoiceAge::MiddleAged,
            accent: VoiceAccent::British,
            accent_strength: 1.4,
        };
        let body = serde_json::to_value(GenerateVoiceRequest::from(&design)).unwrap();
        assert_eq!(body["gender"], "male");
        assert_eq!(body["age"], "middle_aged");
        assert_eq!(body["accent"], "british");
        assert_eq!(body["accent_strength"], 1.4);
        let text = body["text"].as_str().unwrap();
        assert!(text.starts_with("A warm, calm narrator"));
        assert!(text.chars().count() >= 100);
    }

    #[test]
    fn speech_request_shape() {
        let body = serde_json::to_value(SpeechRequest {
            text: "hello",
            model_id: TTS_MODEL,
        })
        .unwrap();
        assert_eq!(body, serde_json::json!({"text": "hello", "model_id": "eleven_multilingual_v2"}));
    }

    #[test]
    fn create_voice_response_parses() {
        let parsed: CreateVoiceResponse = serde_json::from_str(r#"{"voice_id":"v-123","extra":1}"#).unwrap();
        assert_eq!(parsed.voice_id, "v-123");
    }
}
