//! Failure taxonomy for a generation run.
//!
//! Only these kinds cross the pipeline boundary. Search-service hiccups are
//! absorbed by the media resolver and never show up here.

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompositionError {
    #[error("could not invoke {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{tool} exited with {status}: {stderr}")]
    ExitStatus {
        tool: String,
        status: String,
        stderr: String,
    },
    #[error("could not publish output {path}: {reason}")]
    Publish { path: String, reason: String },
    #[error("could not prepare output location: {0}")]
    Prepare(#[source] std::io::Error),
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("unsupported input: {0}")]
    UnsupportedInput(String),
    #[error("failed to generate speech: {0}")]
    NarrationFailure(String),
    #[error("no video found")]
    NoVideoFound,
    #[error("no background audio found")]
    NoBackgroundAudioFound,
    #[error("video creation failed: {0}")]
    CompositionFailure(#[from] CompositionError),
}

impl GenerationError {
    /// Stable machine-readable code for the failure kind.
    pub fn reason(&self) -> &'static str {
        match self {
            GenerationError::UnsupportedInput(_) => "unsupported_input",
            GenerationError::NarrationFailure(_) => "narration_failure",
            GenerationError::NoVideoFound => "no_video_found",
            GenerationError::NoBackgroundAudioFound => "no_background_audio_found",
            GenerationError::CompositionFailure(_) => "composition_failure",
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            GenerationError::UnsupportedInput(_) => 400,
            _ => 500,
        }
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.to_string(),
            reason: self.reason(),
            status: self.status_code(),
        }
    }
}

/// Response payload handed to whatever front-end reports the failure.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub reason: &'static str,
    pub status: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_input_maps_to_400_everything_else_to_500() {
        assert_eq!(GenerationError::UnsupportedInput("empty".into()).status_code(), 400);
        assert_eq!(GenerationError::NoVideoFound.status_code(), 500);
        assert_eq!(GenerationError::NoBackgroundAudioFound.status_code(), 500);
        assert_eq!(GenerationError::NarrationFailure("boom".into()).status_code(), 500);
        let composition = CompositionError::ExitStatus {
            tool: "ffmpeg".into(),
            status: "exit status: 1".into(),
            stderr: String::new(),
        };
        assert_eq!(GenerationError::from(composition).status_code(), 500);
    }

    #[test]
    fn body_serializes_reason_and_status() {
        let body = GenerationError::NoBackgroundAudioFound.body();
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "no background audio found");
        assert_eq!(json["reason"], "no_background_audio_found");
        assert_eq!(json["status"], 500);
    }
}
