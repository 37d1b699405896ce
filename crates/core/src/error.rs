use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SubWhizError {
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Audio extraction failed for {video_path}: {reason}")]
    ExtractionFailure { video_path: PathBuf, reason: String },

    #[error("Transcription failed for {audio_path}: {reason}")]
    TranscriptionFailure { audio_path: PathBuf, reason: String },

    #[error("Muxing subtitles into {video_path} failed: {reason}")]
    MuxFailure { video_path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl SubWhizError {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SubWhizError>;
