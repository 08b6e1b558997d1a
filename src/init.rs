use crate::config::Config;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

pub async fn ensure_directories(cfg: &Config) -> Result<()> {
    for dir in [&cfg.output_dir, &cfg.work_dir, &cfg.model_dir] {
        if !Path::new(dir).exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create dir {}", dir.display()))?;
            tracing::info!("Created directory: {}", dir.display());
        }
    }
    Ok(())
}

pub async fn check_ffmpeg(ffmpeg_path: &str) -> bool {
    match tokio::process::Command::new(ffmpeg_path)
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_directories() {
        let root = tempfile::tempdir().unwrap();
        let mut cfg = Config::from_json(r#"{"pixabay_api_key":"p","freesound_api_key":"f"}"#)
            .unwrap();
        cfg.output_dir = root.path().join("public/videos");
        cfg.work_dir = root.path().join("audio");
        cfg.model_dir = root.path().join("models");

        ensure_directories(&cfg).await.unwrap();
        assert!(cfg.output_dir.is_dir());
        assert!(cfg.work_dir.is_dir());
        assert!(cfg.model_dir.is_dir());

        ensure_directories(&cfg).await.unwrap();
    }

    #[tokio::test]
    async fn missing_binary_is_reported_absent() {
        assert!(!check_ffmpeg("definitely-not-an-ffmpeg-binary").await);
    }
}
