//! Voice design and text-to-speech capability.

use std::future::Future;
use std::pin::Pin;

use avazon_types::error::ProviderError;
use avazon_types::tool::{VoiceAccent, VoiceAge, VoiceGender};

use super::GeneratedMedia;

/// Voice design prompts must fall inside this character range.
pub const VOICE_PROMPT_MIN_CHARS: usize = 100;
pub const VOICE_PROMPT_MAX_CHARS: usize = 1000;

/// Parameters for designing a new synthetic voice.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceDesign {
    pub prompt: String,
    pub gender: VoiceGender,
    pub age: VoiceAge,
    pub accent: VoiceAccent,
    pub accent_strength: f64,
}

impl VoiceDesign {
    /// The prompt padded or truncated into the accepted length range.
    pub fn bounded_prompt(&self) -> String {
        let mut prompt: String = self.prompt.chars().take(VOICE_PROMPT_MAX_CHARS).collect();
        while prompt.chars().count() < VOICE_PROMPT_MIN_CHARS {
            if !prompt.is_empty() {
                prompt.push(' ');
            }
            prompt.push_str("Hello! It is so nice to meet you, let me tell you a little about myself.");
        }
        prompt.chars().take(VOICE_PROMPT_MAX_CHARS).collect()
    }
}

/// A saved voice and the provider that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesignedVoice {
    pub provider: String,
    pub voice_id: String,
}

/// Trait for voice backends.
pub trait VoiceSynthesizer: Send + Sync {
    fn design_voice(
        &self,
        design: &VoiceDesign,
    ) -> impl Future<Output = Result<DesignedVoice, ProviderError>> + Send;

    fn text_to_speech(
        &self,
        voice_id: &str,
        text: &str,
    ) -> impl Future<Output = Result<GeneratedMedia, ProviderError>> + Send;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Object-safe version of [`VoiceSynthesizer`].
pub trait VoiceSynthesizerDyn: Send + Sync {
    fn design_voice_boxed<'a>(&'a self, design: &'a VoiceDesign) -> BoxFuture<'a, DesignedVoice>;
    fn text_to_speech_boxed<'a>(
        &'a self,
        voice_id: &'a str,
        text: &'a str,
    ) -> BoxFuture<'a, GeneratedMedia>;
}

impl<T: VoiceSynthesizer> VoiceSynthesizerDyn for T {
    fn design_voice_boxed<'a>(&'a self, design: &'a VoiceDesign) -> BoxFuture<'a, DesignedVoice> {
        Box::pin(self.design_voice(design))
    }

    fn text_to_speech_boxed<'a>(
        &'a self,
        voice_id: &'a str,
        text: &'a str,
    ) -> BoxFuture<'a, GeneratedMedia> {
        Box::pin(self.text_to_speech(voice_id, text))
    }
}

/// Type-erased voice synthesizer.
pub struct BoxVoiceSynthesizer {
    inner: Box<dyn VoiceSynthesizerDyn>,
}

impl BoxVoiceSynthesizer {
    pub fn new<T: VoiceSynthesizer + 'static>(synthesizer: T) -> Self {
        Self {
            inner: Box::new(synthesizer),
        }
    }

    pub async fn design_voice(&self, design: &VoiceDesign) -> Result<DesignedVoice, ProviderError> {
        self.inner.design_voice_boxed(design).await
    }

    pub async fn text_to_speech(
        &self,
        voice_id: &str,
        text: &str,
    ) -> Result<GeneratedMedia, ProviderError> {
        self.inner.text_to_speech_boxed(voice_id, text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn design(prompt: &str) -> VoiceDesign {
        VoiceDesign {
            prompt: prompt.to_string(),
            gender: VoiceGender::Female,
            age: VoiceAge::Young,
            accent: VoiceAccent::American,
            accent_strength: 1.0,
        }
    }

    #[test]
    fn short_prompt_is_padded() {
        let bounded = design("Hi.").bounded_prompt();
        assert!(bounded.starts_with("Hi. "));
        assert!(bounded.chars().count() >= VOICE_PROMPT_MIN_CHARS);
    }

    #[test]
    fn long_prompt_is_truncated() {
        let bounded = design(&"a".repeat(1500)).bounded_prompt();
        assert_eq!(bounded.chars().count(), VOICE_PROMPT_MAX_CHARS);
    }
}
