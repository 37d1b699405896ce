use std::{fmt, path::PathBuf};

/// A span of transcribed speech, optionally broken down into aligned words.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptSegment {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub words: Vec<WordEntry>,
}

impl TranscriptSegment {
    pub fn new(text: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            words: Vec::new(),
        }
    }

    pub fn with_words(mut self, words: Vec<WordEntry>) -> Self {
        self.words = words;
        self
    }
}

/// Output of the transcription and alignment pass for one audio file.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub language: String,
    pub segments: Vec<TranscriptSegment>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WordEntry {
    pub word: String,
    pub start: f64,
    pub end: f64,
}

impl WordEntry {
    pub fn new(word: impl Into<String>, start: f64, end: f64) -> Self {
        Self {
            word: word.into(),
            start,
            end,
        }
    }
}

/// One numbered entry of an SRT file.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleRecord {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Task {
    #[default]
    Transcribe,
    Translate,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Transcribe => "transcribe",
            Task::Translate => "translate",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Plan,
    Extract,
    Transcribe,
    Serialize,
    Mux,
    Relocate,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Plan => "plan",
            Stage::Extract => "extract",
            Stage::Transcribe => "transcribe",
            Stage::Serialize => "serialize",
            Stage::Mux => "mux",
            Stage::Relocate => "relocate",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Custom font handed to the subtitles filter. Directory and family always travel together.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FontOverride {
    pub dir: PathBuf,
    pub name: String,
}

/// Paths owned by the orchestrator for a single input video.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoJob {
    pub input_path: PathBuf,
    pub audio_path: PathBuf,
    pub subtitle_path: PathBuf,
    pub output_path: PathBuf,
}
