use crate::config::Config;
use crate::logw;
use crate::narration::SpeechSynthesizer;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const ELEVENLABS_BASE: &str = "https://api.elevenlabs.io";

/// Hosted speech backend. Selected with `"tts_backend": "elevenlabs"`.
pub struct ElevenLabsSynthesizer {
    client: Client,
    api_key: String,
    voice_id: String,
    model_id: String,
    base_url: String,
}

impl ElevenLabsSynthesizer {
    pub fn new(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            api_key: cfg.elevenlabs_api_key.clone(),
            voice_id: cfg.eleven_voice_id.clone(),
            model_id: cfg.eleven_model_id.clone(),
            base_url: ELEVENLABS_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsSynthesizer {
    fn audio_extension(&self) -> &'static str {
        "mp3"
    }

    async fn synthesize_to_file(&self, text: &str, out_mp3_path: &Path) -> Result<()> {
        let url = format!(
            "{}/v1/text-to-speech/{}?output_format=mp3_44100_128",
            self.base_url.trim_end_matches('/'),
            self.voice_id
        );

        let body = serde_json::json!({
            "text": text,
            "model_id": self.model_id,
        });

        let resp = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .timeout(Duration::from_secs(300))
            .send()
            .await
            .context("ElevenLabs request failed")?;

        let status = resp.status();
        if !status.is_success() {
            logw(format!("ElevenLabs TTS failed HTTP {}", status.as_u16()));
            anyhow::bail!("ElevenLabs TTS failed HTTP {}", status.as_u16());
        }

        let bytes = resp.bytes().await.context("ElevenLabs response read failed")?;
        if bytes.is_empty() {
            anyhow::bail!("ElevenLabs returned no audio");
        }
        if let Some(parent) = out_mp3_path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create dir {}", parent.display()))?;
        }
        fs::write(out_mp3_path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", out_mp3_path.display()))?;

        Ok(())
    }
}
