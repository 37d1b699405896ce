use std::path::{Path, PathBuf};

use crate::error::{Result, SubWhizError};

/// Base filename without directory or extension, used to key scratch and output files.
pub fn get_file_stem(video_path: &Path) -> Result<String> {
    video_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            SubWhizError::invalid_input(format!(
                "cannot derive a file name from {}",
                video_path.display()
            ))
        })
}

pub fn get_scratch_dir() -> PathBuf {
    std::env::temp_dir()
}

pub fn get_audio_path(scratch_dir: &Path, stem: &str) -> PathBuf {
    scratch_dir.join(format!("{}.wav", stem))
}

pub fn get_subtitle_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}.srt", stem))
}

pub fn get_scratch_video_path(scratch_dir: &Path, stem: &str) -> PathBuf {
    scratch_dir.join(format!("{}_temp.mp4", stem))
}

pub fn get_output_video_path(output_dir: &Path, stem: &str) -> PathBuf {
    output_dir.join(format!("{}.mp4", stem))
}

/// Where whisper-rs models are stored between runs.
pub fn get_model_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("subwhiz")
        .join("models")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stem_drops_directory_and_extension() {
        assert_eq!(
            get_file_stem(Path::new("/videos/clip.final.mov")).unwrap(),
            "clip.final"
        );
        assert_eq!(get_file_stem(Path::new("talk")).unwrap(), "talk");
    }

    #[test]
    fn stem_rejects_pathless_input() {
        assert!(matches!(
            get_file_stem(Path::new("/")),
            Err(SubWhizError::InvalidInput { .. })
        ));
    }

    #[test]
    fn paths_keyed_by_stem() {
        let scratch = Path::new("/scratch");
        let out = Path::new("/out");
        assert_eq!(get_audio_path(scratch, "a"), PathBuf::from("/scratch/a.wav"));
        assert_eq!(get_subtitle_path(out, "a"), PathBuf::from("/out/a.srt"));
        assert_eq!(
            get_scratch_video_path(scratch, "a"),
            PathBuf::from("/scratch/a_temp.mp4")
        );
        assert_eq!(get_output_video_path(out, "a"), PathBuf::from("/out/a.mp4"));
    }
}
