//! Runs the real ffmpeg compositor against generated sources. Skipped when
//! ffmpeg, ffprobe or libx264 are not available on this machine.

use narrated_shorts::compositor::{Compositor, FfmpegCompositor};
use narrated_shorts::keywords::KeywordExtractor;
use narrated_shorts::media::{MediaCandidate, MediaKind};
use std::path::Path;
use std::process::Command;

fn tools_available() -> bool {
    let probe_ok = Command::new("ffprobe")
        .arg("-version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false);
    let encoders = Command::new("ffmpeg")
        .args(["-hide_banner", "-encoders"])
        .output();
    match encoders {
        Ok(out) if out.status.success() && probe_ok => {
            String::from_utf8_lossy(&out.stdout).contains("libx264")
        }
        _ => false,
    }
}

fn lavfi(source: &str, seconds: u32, out: &Path) {
    let status = Command::new("ffmpeg")
        .args(["-y", "-hide_banner", "-loglevel", "error", "-f", "lavfi", "-i"])
        .arg(source)
        .args(["-t", &seconds.to_string()])
        .arg(out)
        .status()
        .unwrap();
    assert!(status.success(), "failed to generate {}", out.display());
}

fn candidate(kind: MediaKind, path: &Path) -> MediaCandidate {
    MediaCandidate {
        kind,
        url: path.to_string_lossy().into_owned(),
        keyword: KeywordExtractor::new(1).extract("fixture").remove(0),
    }
}

#[tokio::test]
async fn output_runs_as_long_as_the_shortest_input() {
    if !tools_available() {
        eprintln!("skipping: ffmpeg with libx264 and ffprobe are required");
        return;
    }

    let sources = tempfile::tempdir().unwrap();
    let video = sources.path().join("clip.mp4");
    let narration = sources.path().join("narration.wav");
    let background = sources.path().join("background.wav");
    lavfi("testsrc=size=320x240:rate=25", 10, &video);
    lavfi("sine=frequency=440:sample_rate=44100", 4, &narration);
    lavfi("sine=frequency=220:sample_rate=44100", 6, &background);

    let out_dir = tempfile::tempdir().unwrap();
    let compositor = FfmpegCompositor::new("ffmpeg", "ffprobe", out_dir.path());
    let composed = compositor
        .compose(
            &candidate(MediaKind::Video, &video),
            &narration,
            &candidate(MediaKind::BackgroundAudio, &background),
        )
        .await
        .unwrap();

    assert!(composed.path.exists());
    assert_eq!(composed.path.parent(), Some(out_dir.path()));
    let duration = composed.duration_secs.unwrap();
    assert!((duration - 4.0).abs() < 0.3, "duration was {duration}");

    let leftovers: Vec<_> = std::fs::read_dir(out_dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with(".partial-"))
        .collect();
    assert!(leftovers.is_empty());
}
