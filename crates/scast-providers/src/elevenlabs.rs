//! ElevenLabs sound effects and text-to-speech.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::info;

use crate::error::ProviderResult;
use crate::http::{build_client, required_env, send_checked};
use crate::services::{SoundEffects, SpeechSynthesizer};

pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io";
pub const DEFAULT_VOICE_ID: &str = "JBFqnCBsd6RMkjVDRZzb";
pub const DEFAULT_TTS_MODEL: &str = "eleven_multilingual_v2";
pub const OUTPUT_FORMAT: &str = "mp3_44100_128";

/// Longest sound effect the service generates in one request.
pub const MAX_SOUND_SECONDS: f64 = 22.0;
/// Shortest sound effect the service accepts.
pub const MIN_SOUND_SECONDS: f64 = 0.5;
pub const DEFAULT_PROMPT_INFLUENCE: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub base_url: String,
    pub voice_id: String,
    pub tts_model: String,
    pub prompt_influence: f64,
    pub timeout: Duration,
}

impl ElevenLabsConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            voice_id: DEFAULT_VOICE_ID.to_string(),
            tts_model: DEFAULT_TTS_MODEL.to_string(),
            prompt_influence: DEFAULT_PROMPT_INFLUENCE,
            timeout: Duration::from_secs(120),
        }
    }

    /// Read `ELEVEN_LABS_API_KEY`.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self::new(required_env("ELEVEN_LABS_API_KEY")?))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }
}

pub struct ElevenLabsClient {
    config: ElevenLabsConfig,
    client: Client,
}

impl ElevenLabsClient {
    pub fn new(config: ElevenLabsConfig) -> ProviderResult<Self> {
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ElevenLabsConfig::from_env()?)
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), suffix)
    }
}

#[async_trait]
impl SoundEffects for ElevenLabsClient {
    async fn generate_sound(&self, prompt: &str, duration_seconds: f64) -> ProviderResult<Vec<u8>> {
        let duration = duration_seconds.clamp(MIN_SOUND_SECONDS, MAX_SOUND_SECONDS);
        info!(duration_seconds = duration, "Generating sound effect");

        let response = send_checked(
            "elevenlabs",
            "sound_generation",
            self.client
                .post(self.url("/v1/sound-generation"))
                .header("xi-api-key", &self.config.api_key)
                .json(&json!({
                    "text": prompt,
                    "duration_seconds": duration,
                    "prompt_influence": self.config.prompt_influence,
                })),
        )
        .await?;

        Ok(response.bytes().await?.to_vec())
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, text: &str) -> ProviderResult<Vec<u8>> {
        let response = send_checked(
            "elevenlabs",
            "text_to_speech",
            self.client
                .post(self.url(&format!("/v1/text-to-speech/{}", self.config.voice_id)))
                .query(&[("output_format", OUTPUT_FORMAT)])
                .header("xi-api-key", &self.config.api_key)
                .json(&json!({
                    "text": text,
                    "model_id": self.config.tts_model,
                })),
        )
        .await?;

        Ok(response.bytes().await?.to_vec())
    }
}
