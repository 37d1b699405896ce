use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use serde::Deserialize;
use tokio::{fs, process::Command};
use tracing::debug;

use crate::{
    error::{Result, SubWhizError},
    types::{Task, Transcript, TranscriptSegment, WordEntry},
};

/// Speech recognition plus word alignment.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio_path: &Path, task: Task, language: &str)
    -> Result<Transcript>;

    /// Drop model state cached between files (decoder state, accelerator buffers).
    fn release_cache(&self) {}
}

#[derive(Deserialize)]
struct RawTranscript {
    #[serde(default)]
    language: Option<String>,
    segments: Vec<RawSegment>,
}

#[derive(Deserialize)]
struct RawSegment {
    text: String,
    start: f64,
    end: f64,
    #[serde(default)]
    words: Vec<RawWord>,
}

/// Words the aligner could not place come without timestamps.
#[derive(Deserialize)]
struct RawWord {
    word: String,
    #[serde(default)]
    start: Option<f64>,
    #[serde(default)]
    end: Option<f64>,
}

/// Parse whisper's JSON output, keeping only words that carry both timestamps.
pub fn parse_whisper_json(json: &str, fallback_language: &str) -> Result<Transcript> {
    let raw: RawTranscript = serde_json::from_str(json)?;

    let segments = raw
        .segments
        .into_iter()
        .map(|seg| {
            let words = seg
                .words
                .into_iter()
                .filter_map(|w| match (w.start, w.end) {
                    (Some(start), Some(end)) => Some(WordEntry::new(w.word, start, end)),
                    _ => None,
                })
                .collect();
            TranscriptSegment::new(seg.text, seg.start, seg.end).with_words(words)
        })
        .collect();

    Ok(Transcript {
        language: raw
            .language
            .unwrap_or_else(|| fallback_language.to_string()),
        segments,
    })
}

/// Runs the `whisper` command line tool with word timestamps enabled.
#[derive(Clone, Debug)]
pub struct WhisperCliTranscriber {
    program: OsString,
    model: String,
}

impl WhisperCliTranscriber {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            program: OsString::from("whisper"),
            model: model.into(),
        }
    }

    pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
        self.program = program.into();
        self
    }

    fn json_output_path(audio_path: &Path) -> PathBuf {
        // whisper names its output after the input file
        audio_path.with_extension("json")
    }
}

#[async_trait]
impl Transcriber for WhisperCliTranscriber {
    async fn transcribe(
        &self,
        audio_path: &Path,
        task: Task,
        language: &str,
    ) -> Result<Transcript> {
        let failure = |reason: String| SubWhizError::TranscriptionFailure {
            audio_path: audio_path.to_path_buf(),
            reason,
        };
        let output_dir = audio_path.parent().unwrap_or(Path::new("."));

        let output = Command::new(&self.program)
            .arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--task")
            .arg(task.as_str())
            .arg("--language")
            .arg(language)
            .arg("--word_timestamps")
            .arg("True")
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(output_dir)
            .arg("--verbose")
            .arg("False")
            .output()
            .await
            .map_err(|e| failure(format!("failed to run whisper: {}", e)))?;

        if !output.status.success() {
            return Err(failure(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }

        let json_path = Self::json_output_path(audio_path);
        let json_content = fs::read_to_string(&json_path)
            .await
            .map_err(|e| failure(format!("missing {}: {}", json_path.display(), e)))?;
        if let Err(e) = fs::remove_file(&json_path).await {
            debug!(path = %json_path.display(), error = %e, "could not remove whisper output");
        }

        parse_whisper_json(&json_content, language)
            .map_err(|e| failure(format!("unreadable whisper output: {}", e)))
    }
}
