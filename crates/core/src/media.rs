use std::{ffi::OsString, path::Path};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::{
    error::{Result, SubWhizError},
    style::{SubtitleStyle, subtitles_filter},
    types::FontOverride,
};

/// Produces a mono 16 kHz 16-bit PCM WAV from any media file.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()>;
}

/// Burns a subtitle file into a video, keeping the original audio stream.
#[async_trait]
pub trait VideoMuxer: Send + Sync {
    async fn mux(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        font: Option<&FontOverride>,
        output_path: &Path,
    ) -> Result<()>;
}

fn stderr_text(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr).trim().to_string()
}

#[derive(Clone, Debug)]
pub struct FfmpegAudioExtractor {
    program: OsString,
}

impl FfmpegAudioExtractor {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for FfmpegAudioExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
        let failure = |reason: String| SubWhizError::ExtractionFailure {
            video_path: video_path.to_path_buf(),
            reason,
        };

        let output = Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(video_path)
            .arg("-vn")
            .arg("-acodec")
            .arg("pcm_s16le")
            .arg("-ac")
            .arg("1")
            .arg("-ar")
            .arg("16000")
            .arg(audio_path)
            .output()
            .await
            .map_err(|e| failure(format!("failed to run ffmpeg: {}", e)))?;

        debug!(stderr = %stderr_text(&output.stderr), "ffmpeg audio extraction finished");

        if !output.status.success() {
            return Err(failure(stderr_text(&output.stderr)));
        }

        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct FfmpegVideoMuxer {
    program: OsString,
    style: SubtitleStyle,
}

impl FfmpegVideoMuxer {
    pub fn new() -> Self {
        Self::with_program("ffmpeg")
    }

    pub fn with_program(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
            style: SubtitleStyle::default(),
        }
    }

    /// Base style; a font override replaces only the family.
    pub fn with_style(mut self, style: SubtitleStyle) -> Self {
        self.style = style;
        self
    }

    fn filter_for(&self, subtitle_path: &Path, font: Option<&FontOverride>) -> String {
        let style = self.style.with_font(font);
        subtitles_filter(subtitle_path, font.map(|f| f.dir.as_path()), &style)
    }
}

impl Default for FfmpegVideoMuxer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoMuxer for FfmpegVideoMuxer {
    async fn mux(
        &self,
        video_path: &Path,
        subtitle_path: &Path,
        font: Option<&FontOverride>,
        output_path: &Path,
    ) -> Result<()> {
        let failure = |reason: String| SubWhizError::MuxFailure {
            video_path: video_path.to_path_buf(),
            reason,
        };

        let output = Command::new(&self.program)
            .arg("-y")
            .arg("-i")
            .arg(video_path)
            .arg("-vf")
            .arg(self.filter_for(subtitle_path, font))
            .arg("-map")
            .arg("0:v:0")
            .arg("-map")
            .arg("0:a?")
            .arg("-c:a")
            .arg("copy")
            .arg(output_path)
            .output()
            .await
            .map_err(|e| failure(format!("failed to run ffmpeg: {}", e)))?;

        debug!(stderr = %stderr_text(&output.stderr), "ffmpeg mux finished");

        if !output.status.success() {
            return Err(failure(stderr_text(&output.stderr)));
        }

        Ok(())
    }
}
