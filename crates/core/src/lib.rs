//! SubWhiz Core Library
//!
//! Turns videos into subtitled videos: extract audio with ffmpeg, transcribe and
//! align it with Whisper, write SRT files, and burn them back into the video.

pub mod error;
pub mod format;
pub mod media;
pub mod paths;
pub mod pipeline;
pub mod srt;
pub mod style;
pub mod transcriber;
pub mod types;
#[cfg(feature = "whisper-rs")]
pub mod whisper;

// Re-export commonly used items at crate root
pub use error::{Result, SubWhizError};
pub use format::format_timestamp;
pub use media::{AudioExtractor, FfmpegAudioExtractor, FfmpegVideoMuxer, VideoMuxer};
pub use pipeline::{
    BatchOutcome, FailurePolicy, ProcessOptions, SubWhiz, SubWhizConfig, VideoFailure,
};
pub use srt::{subtitle_records, write_subtitle_file, write_subtitles};
pub use style::SubtitleStyle;
pub use transcriber::{Transcriber, WhisperCliTranscriber};
pub use types::{
    FontOverride, Stage, SubtitleRecord, Task, Transcript, TranscriptSegment, VideoJob, WordEntry,
};
#[cfg(feature = "whisper-rs")]
pub use whisper::{WhisperRsTranscriber, ensure_model};
