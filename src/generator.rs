use crate::api::elevenlabs::ElevenLabsSynthesizer;
use crate::api::freesound::FreesoundAudioSearch;
use crate::api::pixabay::PixabayVideoSearch;
use crate::compositor::{Compositor, FfmpegCompositor};
use crate::config::{Config, TtsBackend};
use crate::document;
use crate::error::GenerationError;
use crate::keywords::{Keyword, KeywordExtractor};
use crate::media::{MediaCandidate, MediaResolver, Resolution, ResolvedMedia, SelectionPolicy};
use crate::narration::{CoquiLaunch, CoquiSpeechModel, NarrationSynthesizer, SpeechSynthesizer};
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Steps of a single run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Resolving,
    Validating,
    Composing,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Resolving => "resolving",
            Stage::Validating => "validating",
            Stage::Composing => "composing",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub struct GeneratedVideo {
    pub path: PathBuf,
    pub duration_secs: Option<f64>,
    pub keywords: Vec<Keyword>,
    pub video: MediaCandidate,
    pub background: MediaCandidate,
}

/// Text → narrated video. One value serves any number of concurrent requests;
/// each call to [`Pipeline::generate_from_text`] is an independent run.
pub struct Pipeline {
    extractor: KeywordExtractor,
    resolver: MediaResolver,
    narrator: NarrationSynthesizer,
    compositor: Arc<dyn Compositor>,
    policy: SelectionPolicy,
    runs: AtomicU64,
}

impl Pipeline {
    pub fn new(
        extractor: KeywordExtractor,
        resolver: MediaResolver,
        narrator: NarrationSynthesizer,
        compositor: Arc<dyn Compositor>,
        policy: SelectionPolicy,
    ) -> Self {
        Self {
            extractor,
            resolver,
            narrator,
            compositor,
            policy,
            runs: AtomicU64::new(0),
        }
    }

    /// Wires the production services described by `cfg`. Starts the speech
    /// server, which loads (and if needed downloads) the model, so call this
    /// once at startup.
    pub async fn from_config(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        let timeout = cfg.resolver_timeout();
        let video = PixabayVideoSearch::new(client.clone(), &cfg.pixabay_api_key, timeout);
        let audio = FreesoundAudioSearch::new(client.clone(), &cfg.freesound_api_key, timeout);
        let resolver = MediaResolver::new(Arc::new(video), Arc::new(audio), timeout);

        let backend: Arc<dyn SpeechSynthesizer> = match cfg.tts_backend {
            TtsBackend::Coqui => {
                let model = match &cfg.tts_server_url {
                    Some(url) => CoquiSpeechModel::connect(client.clone(), url, &cfg.tts_model_name),
                    None => CoquiSpeechModel::load(client.clone(), &CoquiLaunch::from_config(cfg))
                        .await
                        .context("Failed to load TTS model")?,
                };
                Arc::new(model)
            }
            TtsBackend::Elevenlabs => Arc::new(ElevenLabsSynthesizer::new(client.clone(), cfg)),
        };
        let narrator = NarrationSynthesizer::new(backend, &cfg.work_dir, cfg.synthesis_concurrency);

        let compositor = FfmpegCompositor::new(&cfg.ffmpeg_path, &cfg.ffprobe_path, &cfg.output_dir);

        Ok(Self::new(
            KeywordExtractor::new(cfg.keyword_count),
            resolver,
            narrator,
            Arc::new(compositor),
            cfg.selection_policy,
        ))
    }

    pub async fn generate_from_file(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
    ) -> Result<GeneratedVideo, GenerationError> {
        logi(format!("Extracting text from {} ({} bytes)", file_name, bytes.len()));
        let text = document::extract_text(bytes, file_name).await?;
        self.generate_from_text(&text).await
    }

    pub async fn generate_from_text(&self, text: &str) -> Result<GeneratedVideo, GenerationError> {
        let run = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
        let result = self.run(run, text).await;
        match &result {
            Ok(video) => logok(format!("[run {run}] {}: {}", Stage::Done, video.path.display())),
            Err(err) => logw(format!("[run {run}] {} with failure ({}): {}", Stage::Done, err.reason(), err)),
        }
        result
    }

    async fn run(&self, run: u64, text: &str) -> Result<GeneratedVideo, GenerationError> {
        if text.trim().is_empty() {
            return Err(GenerationError::UnsupportedInput("empty text".to_string()));
        }

        logi(format!("[run {run}] {}: {} chars of text", Stage::Start, text.chars().count()));
        let keywords = self.extractor.extract(text);
        if keywords.is_empty() {
            logw(format!("[run {run}] no keywords in text; media lookup will find nothing"));
        } else {
            let list: Vec<&str> = keywords.iter().map(Keyword::as_str).collect();
            logi(format!("[run {run}] keywords: {}", list.join(", ")));
        }

        let to_resolve = self.policy.keywords_to_resolve(&keywords);
        logi(format!(
            "[run {run}] {}: media for {} keyword(s), narration in parallel",
            Stage::Resolving,
            to_resolve.len()
        ));
        let (resolved, narration) = tokio::join!(
            self.resolver.resolve_all(to_resolve),
            self.narrator.synthesize(text),
        );
        log_resolutions(run, &resolved);

        logi(format!("[run {run}] {}", Stage::Validating));
        let narration = narration?;
        let selection = self.policy.select(&resolved);
        let video = selection.video.ok_or(GenerationError::NoVideoFound)?;
        let background = selection.audio.ok_or(GenerationError::NoBackgroundAudioFound)?;

        logi(format!(
            "[run {run}] {}: video from '{}', background from '{}'",
            Stage::Composing,
            video.keyword,
            background.keyword
        ));
        let composed = self
            .compositor
            .compose(&video, narration.path(), &background)
            .await?;
        drop(narration);

        Ok(GeneratedVideo {
            path: composed.path,
            duration_secs: composed.duration_secs,
            keywords,
            video,
            background,
        })
    }
}

fn log_resolutions(run: u64, resolved: &[ResolvedMedia]) {
    for media in resolved {
        logi(format!(
            "[run {run}] '{}': video {}, background {}",
            media.keyword,
            describe(&media.video),
            describe(&media.audio)
        ));
    }
}

fn describe(resolution: &Resolution) -> &'static str {
    match resolution {
        Resolution::Found(_) => "found",
        Resolution::NotFound => "not found",
        Resolution::TimedOut => "timed out",
    }
}
