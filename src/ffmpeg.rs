use crate::error::CompositionError;
use crate::tail_chars;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

pub const VIDEO_CODEC: &str = "libx264";
pub const AUDIO_CODEC: &str = "aac";
pub const AUDIO_BITRATE: &str = "192k";

/// Narration and background mixed at equal weight, cut at the shorter of the two.
pub const MIX_FILTER: &str = "[1:a][2:a]amix=inputs=2:duration=shortest[aout]";

pub(crate) async fn run_cmd(args: &[String]) -> Result<(), CompositionError> {
    let Some((program, rest)) = args.split_first() else {
        return Err(CompositionError::Spawn {
            tool: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command line"),
        });
    };

    let output = Command::new(program)
        .args(rest)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| CompositionError::Spawn {
            tool: program.clone(),
            source,
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CompositionError::ExitStatus {
            tool: program.clone(),
            status: output.status.to_string(),
            stderr: tail_chars(stderr.trim(), 800),
        });
    }

    Ok(())
}

pub async fn ffprobe_duration_seconds(ffprobe: &str, path: &Path) -> Result<f64> {
    let output = Command::new(ffprobe)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed"));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.1 {
        return Err(anyhow::anyhow!("Invalid duration"));
    }
    Ok(duration)
}

/// Full argument vector (program first) for muxing one video with narration
/// and background audio into `out_mp4`.
pub fn mux_args(
    ffmpeg: &str,
    video_src: &str,
    narration: &Path,
    background_src: &str,
    out_mp4: &Path,
) -> Vec<String> {
    vec![
        ffmpeg.to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-i".to_string(),
        video_src.to_string(),
        "-i".to_string(),
        narration.display().to_string(),
        "-i".to_string(),
        background_src.to_string(),
        "-filter_complex".to_string(),
        MIX_FILTER.to_string(),
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "[aout]".to_string(),
        "-c:v".to_string(),
        VIDEO_CODEC.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-c:a".to_string(),
        AUDIO_CODEC.to_string(),
        "-b:a".to_string(),
        AUDIO_BITRATE.to_string(),
        "-shortest".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        out_mp4.display().to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_after<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
        args.windows(2)
            .filter(|w| w[0] == flag)
            .map(|w| w[1].as_str())
            .collect()
    }

    #[test]
    fn mux_inputs_keep_video_narration_background_order() {
        let args = mux_args(
            "ffmpeg",
            "https://cdn/cat.mp4",
            Path::new("audio/n/narration.wav"),
            "https://fs/cat.mp3",
            Path::new("public/videos/.partial-x.mp4"),
        );
        assert_eq!(args[0], "ffmpeg");
        assert_eq!(
            value_after(&args, "-i"),
            ["https://cdn/cat.mp4", "audio/n/narration.wav", "https://fs/cat.mp3"]
        );
        assert_eq!(args.last().unwrap(), "public/videos/.partial-x.mp4");
    }

    #[test]
    fn mux_mixes_audio_and_cuts_to_shortest() {
        let args = mux_args("ffmpeg", "v", Path::new("n"), "b", Path::new("o.mp4"));
        assert_eq!(value_after(&args, "-filter_complex"), [MIX_FILTER]);
        assert_eq!(value_after(&args, "-map"), ["0:v", "[aout]"]);
        assert_eq!(value_after(&args, "-c:v"), ["libx264"]);
        assert_eq!(value_after(&args, "-c:a"), ["aac"]);
        assert_eq!(value_after(&args, "-b:a"), ["192k"]);
        assert!(args.iter().any(|a| a == "-shortest"));
        assert!(args.iter().any(|a| a == "-y"));
    }

    #[tokio::test]
    async fn missing_tool_is_a_spawn_error() {
        let args = vec!["definitely-not-ffmpeg".to_string(), "-version".to_string()];
        let err = run_cmd(&args).await.unwrap_err();
        assert!(matches!(err, CompositionError::Spawn { .. }));
    }

    #[tokio::test]
    async fn empty_command_line_is_rejected() {
        let err = run_cmd(&[]).await.unwrap_err();
        match err {
            CompositionError::Spawn { source, .. } => {
                assert_eq!(source.kind(), std::io::ErrorKind::InvalidInput)
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
