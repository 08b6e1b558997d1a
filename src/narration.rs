//! Narration synthesis.
//!
//! The speech backend is an opaque text → audio file service. It is built
//! once at startup, shared behind an `Arc`, and every request goes through
//! [`NarrationSynthesizer`], which bounds how many syntheses run at once and
//! owns the scratch location of each artifact.

use crate::config::Config;
use crate::error::GenerationError;
use crate::{logi, logok, tail_chars};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs;
use tokio::process::{Child, Command};
use tokio::sync::Semaphore;
use tokio::time::Instant;

const TEXT_PREVIEW_CHARS: usize = 100;
const READY_POLL: Duration = Duration::from_millis(250);
const SYNTHESIS_TIMEOUT: Duration = Duration::from_secs(1800);

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Extension of the audio container the backend writes.
    fn audio_extension(&self) -> &'static str;

    async fn synthesize_to_file(&self, text: &str, out_path: &Path) -> Result<()>;
}

/// Speech audio for one run. The backing scratch directory is removed when
/// the artifact is dropped.
#[derive(Debug)]
pub struct NarrationArtifact {
    path: PathBuf,
    _scratch: TempDir,
}

impl NarrationArtifact {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct NarrationSynthesizer {
    backend: Arc<dyn SpeechSynthesizer>,
    work_dir: PathBuf,
    permits: Semaphore,
}

impl NarrationSynthesizer {
    pub fn new(backend: Arc<dyn SpeechSynthesizer>, work_dir: impl Into<PathBuf>, concurrency: usize) -> Self {
        Self {
            backend,
            work_dir: work_dir.into(),
            permits: Semaphore::new(concurrency.max(1)),
        }
    }

    pub async fn synthesize(&self, text: &str) -> Result<NarrationArtifact, GenerationError> {
        if text.trim().is_empty() {
            return Err(GenerationError::NarrationFailure("no text to narrate".to_string()));
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| GenerationError::NarrationFailure(e.to_string()))?;

        self.render(text)
            .await
            .map_err(|e| GenerationError::NarrationFailure(format!("{e:#}")))
    }

    async fn render(&self, text: &str) -> Result<NarrationArtifact> {
        fs::create_dir_all(&self.work_dir)
            .await
            .with_context(|| format!("Failed to create dir {}", self.work_dir.display()))?;
        let scratch = tempfile::Builder::new()
            .prefix("narration-")
            .tempdir_in(&self.work_dir)
            .context("Failed to create narration scratch dir")?;
        let path = scratch
            .path()
            .join(format!("narration.{}", self.backend.audio_extension()));

        logi(format!("Generating speech for text: {}...", preview(text)));
        self.backend.synthesize_to_file(text, &path).await?;

        let size = fs::metadata(&path)
            .await
            .map(|m| m.len())
            .with_context(|| format!("Synthesizer wrote no file at {}", path.display()))?;
        if size == 0 {
            anyhow::bail!("Synthesizer produced an empty file");
        }

        logok(format!("Speech generated: {} ({} bytes)", path.display(), size));
        Ok(NarrationArtifact {
            path,
            _scratch: scratch,
        })
    }
}

fn preview(text: &str) -> String {
    text.chars().take(TEXT_PREVIEW_CHARS).collect()
}

/// How to start the local Coqui TTS server.
#[derive(Debug, Clone)]
pub struct CoquiLaunch {
    /// Server program, e.g. `tts-server`.
    pub command: String,
    /// Arguments placed before `--model_name` and `--port`.
    pub leading_args: Vec<String>,
    pub model_name: String,
    pub cache_root: PathBuf,
    pub port: u16,
    pub startup_timeout: Duration,
}

impl CoquiLaunch {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            command: cfg.tts_command.clone(),
            leading_args: cfg.tts_command_args.clone(),
            model_name: cfg.tts_model_name.clone(),
            cache_root: cfg.model_dir.clone(),
            port: cfg.tts_port,
            startup_timeout: Duration::from_secs(cfg.tts_startup_timeout_secs),
        }
    }

    fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}

/// Local Coqui TTS model held by one long-lived `tts-server` process.
///
/// The server loads the model once when [`CoquiSpeechModel::load`] starts it,
/// downloading it first into `<cache_root>/tts/<name with '/' replaced by '--'>`
/// when it is not cached. Every synthesis is a POST to that server with the
/// text in the form body. The process is killed when the model is dropped.
#[derive(Debug)]
pub struct CoquiSpeechModel {
    client: Client,
    base_url: String,
    model_name: String,
    _server: Option<Child>,
}

impl CoquiSpeechModel {
    pub async fn load(client: Client, launch: &CoquiLaunch) -> Result<Self> {
        fs::create_dir_all(&launch.cache_root)
            .await
            .with_context(|| format!("Failed to create dir {}", launch.cache_root.display()))?;

        logi(format!("Checking for TTS model {}...", launch.model_name));
        let model_dir = model_cache_dir(&launch.cache_root, &launch.model_name);
        if model_dir.is_dir() {
            logok(format!("TTS model cached: {}", model_dir.display()));
        } else {
            logi(format!("Downloading TTS model {}...", launch.model_name));
        }

        let mut server = Command::new(&launch.command)
            .args(&launch.leading_args)
            .arg("--model_name")
            .arg(&launch.model_name)
            .arg("--port")
            .arg(launch.port.to_string())
            .env("TTS_HOME", &launch.cache_root)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start {}", launch.command))?;

        let base_url = launch.base_url();
        wait_until_ready(&client, &base_url, &mut server, launch.startup_timeout)
            .await
            .with_context(|| format!("TTS server '{}' did not come up", launch.command))?;
        logok(format!("TTS model {} loaded, serving at {}", launch.model_name, base_url));

        Ok(Self {
            client,
            base_url,
            model_name: launch.model_name.clone(),
            _server: Some(server),
        })
    }

    /// Talks to a `tts-server` that is already running at `base_url`.
    pub fn connect(client: Client, base_url: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model_name: model_name.into(),
            _server: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }
}

async fn wait_until_ready(client: &Client, base_url: &str, server: &mut Child, limit: Duration) -> Result<()> {
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = server.try_wait().context("Failed to poll TTS server")? {
            anyhow::bail!("server exited with {} before becoming ready", status);
        }
        if let Ok(resp) = client.get(base_url).timeout(READY_POLL * 4).send().await {
            if resp.status().is_success() {
                return Ok(());
            }
        }
        if Instant::now() >= deadline {
            anyhow::bail!("not ready after {:?}", limit);
        }
        tokio::time::sleep(READY_POLL).await;
    }
}

pub fn model_cache_dir(cache_root: &Path, model_name: &str) -> PathBuf {
    cache_root.join("tts").join(model_name.replace('/', "--"))
}

#[async_trait]
impl SpeechSynthesizer for CoquiSpeechModel {
    fn audio_extension(&self) -> &'static str {
        "wav"
    }

    async fn synthesize_to_file(&self, text: &str, out_path: &Path) -> Result<()> {
        let resp = self
            .client
            .post(format!("{}/api/tts", self.base_url))
            .form(&[("text", text)])
            .timeout(SYNTHESIS_TIMEOUT)
            .send()
            .await
            .context("TTS server request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("TTS server returned {}: {}", status, tail_chars(body.trim(), 400));
        }

        let audio = resp.bytes().await.context("Failed to read TTS audio")?;
        if audio.is_empty() {
            anyhow::bail!("TTS server returned no audio");
        }
        fs::write(out_path, &audio)
            .await
            .with_context(|| format!("Failed to write {}", out_path.display()))?;
        Ok(())
    }
}
