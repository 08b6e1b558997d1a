use crate::media::SelectionPolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtsBackend {
    Coqui,
    Elevenlabs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub pixabay_api_key: String,
    pub freesound_api_key: String,
    #[serde(default = "default_keyword_count")]
    pub keyword_count: usize,
    #[serde(default = "default_resolver_timeout_secs")]
    pub resolver_timeout_secs: u64,
    #[serde(default)]
    pub selection_policy: SelectionPolicy,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    #[serde(default = "default_tts_backend")]
    pub tts_backend: TtsBackend,
    #[serde(default = "default_tts_model_name")]
    pub tts_model_name: String,
    /// Coqui server program, started once at startup.
    #[serde(default = "default_tts_command")]
    pub tts_command: String,
    #[serde(default)]
    pub tts_command_args: Vec<String>,
    #[serde(default = "default_tts_port")]
    pub tts_port: u16,
    #[serde(default = "default_tts_startup_timeout_secs")]
    pub tts_startup_timeout_secs: u64,
    /// Use an already running Coqui server instead of starting one.
    #[serde(default)]
    pub tts_server_url: Option<String>,
    #[serde(default = "default_synthesis_concurrency")]
    pub synthesis_concurrency: usize,
    #[serde(default)]
    pub elevenlabs_api_key: String,
    #[serde(default = "default_voice_id")]
    pub eleven_voice_id: String,
    #[serde(default = "default_model_id")]
    pub eleven_model_id: String,
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: String,
}

fn default_keyword_count() -> usize {
    3
}

fn default_resolver_timeout_secs() -> u64 {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("public/videos")
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("audio")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_tts_backend() -> TtsBackend {
    TtsBackend::Coqui
}

fn default_tts_model_name() -> String {
    "tts_models/en/ljspeech/speedy-speech".to_string()
}

fn default_tts_command() -> String {
    "tts-server".to_string()
}

fn default_tts_port() -> u16 {
    5002
}

// First start may include the model download.
fn default_tts_startup_timeout_secs() -> u64 {
    600
}

fn default_synthesis_concurrency() -> usize {
    1
}

fn default_voice_id() -> String {
    "JBFqnCBsd6RMkjVDRZzb".to_string()
}

fn default_model_id() -> String {
    "eleven_multilingual_v2".to_string()
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe_path() -> String {
    "ffprobe".to_string()
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {}", path.as_ref().display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Invalid config: {}", path.as_ref().display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.pixabay_api_key.is_empty() {
            anyhow::bail!("config.json: pixabay_api_key missing");
        }
        if self.freesound_api_key.is_empty() {
            anyhow::bail!("config.json: freesound_api_key missing");
        }
        if self.keyword_count == 0 {
            anyhow::bail!("config.json: keyword_count must be at least 1");
        }
        if self.resolver_timeout_secs == 0 {
            anyhow::bail!("config.json: resolver_timeout_secs must be at least 1");
        }
        if self.synthesis_concurrency == 0 {
            anyhow::bail!("config.json: synthesis_concurrency must be at least 1");
        }
        if self.tts_startup_timeout_secs == 0 {
            anyhow::bail!("config.json: tts_startup_timeout_secs must be at least 1");
        }
        if self.tts_backend == TtsBackend::Elevenlabs && self.elevenlabs_api_key.is_empty() {
            anyhow::bail!("config.json: elevenlabs_api_key missing (tts_backend = elevenlabs)");
        }
        Ok(())
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_secs(self.resolver_timeout_secs)
    }
}
