use std::{
    collections::HashSet,
    io,
    path::{Path, PathBuf},
};

use thiserror::Error;
use tokio::fs;
use tracing::{debug, error, info};

use crate::{
    error::{Result, SubWhizError},
    media::{AudioExtractor, VideoMuxer},
    paths::{
        get_audio_path, get_file_stem, get_output_video_path, get_scratch_dir,
        get_scratch_video_path, get_subtitle_path,
    },
    srt::write_subtitle_file,
    transcriber::Transcriber,
    types::{FontOverride, Stage, Task, VideoJob},
};

/// What a failed video does to the rest of the batch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    #[default]
    AbortBatch,
    SkipVideo,
}

/// Settings fixed for the lifetime of a [`SubWhiz`] instance.
#[derive(Clone, Debug)]
pub struct SubWhizConfig {
    pub output_dir: PathBuf,
    pub language: String,
    pub verbose: bool,
    pub scratch_dir: PathBuf,
    pub failure_policy: FailurePolicy,
}

impl SubWhizConfig {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            language: "es".to_string(),
            verbose: false,
            scratch_dir: get_scratch_dir(),
            failure_policy: FailurePolicy::default(),
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_scratch_dir(mut self, scratch_dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = scratch_dir.into();
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }
}

/// Per-invocation switches for [`SubWhiz::process_videos`].
#[derive(Clone, Debug, Default)]
pub struct ProcessOptions {
    /// Write `.srt` files into the output directory instead of scratch space.
    pub output_srt: bool,
    /// Stop after subtitle generation.
    pub srt_only: bool,
    pub task: Task,
    pub font: Option<FontOverride>,
    pub word_by_word: bool,
    /// Leave the extracted WAV in scratch space after transcription.
    pub keep_audio: bool,
}

/// A video that did not make it through the pipeline, and where it stopped.
#[derive(Error, Debug)]
#[error("{} failed at the {stage} stage: {error}", .input_path.display())]
pub struct VideoFailure {
    pub input_path: PathBuf,
    pub stage: Stage,
    #[source]
    pub error: SubWhizError,
}

/// Results of a batch, in input order.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub jobs: Vec<VideoJob>,
    pub failures: Vec<VideoFailure>,
}

impl BatchOutcome {
    /// Input video path mapped to its subtitle file.
    pub fn subtitles(&self) -> impl Iterator<Item = (&Path, &Path)> {
        self.jobs
            .iter()
            .map(|job| (job.input_path.as_path(), job.subtitle_path.as_path()))
    }
}

/// Move a finished file into place without exposing a partial file at `to`.
pub async fn relocate(from: &Path, to: &Path) -> Result<()> {
    match fs::rename(from, to).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            let mut partial_name = to.file_name().unwrap_or_default().to_os_string();
            partial_name.push(".partial");
            let partial = to.with_file_name(partial_name);

            copy_into_place(from, &partial, to).await
        }
        Err(e) => Err(e.into()),
    }
}

/// Copy `from` to `partial`, then rename it over `to`. Once `to` exists the
/// move counts as done even if the scratch copy cannot be removed.
async fn copy_into_place(from: &Path, partial: &Path, to: &Path) -> Result<()> {
    let placed = match fs::copy(from, partial).await {
        Ok(_) => fs::rename(partial, to).await,
        Err(e) => Err(e),
    };
    if let Err(e) = placed {
        remove_scratch(partial).await;
        return Err(e.into());
    }

    remove_scratch(from).await;
    Ok(())
}

async fn remove_scratch(path: &Path) {
    if let Err(e) = fs::remove_file(path).await
        && e.kind() != io::ErrorKind::NotFound
    {
        debug!(path = %path.display(), error = %e, "could not remove scratch file");
    }
}

pub struct SubWhiz {
    config: SubWhizConfig,
    extractor: Box<dyn AudioExtractor>,
    transcriber: Box<dyn Transcriber>,
    muxer: Box<dyn VideoMuxer>,
}

impl SubWhiz {
    /// Creates the output directory if it does not exist yet.
    pub async fn new(
        config: SubWhizConfig,
        extractor: Box<dyn AudioExtractor>,
        transcriber: Box<dyn Transcriber>,
        muxer: Box<dyn VideoMuxer>,
    ) -> Result<Self> {
        fs::create_dir_all(&config.output_dir).await?;
        fs::create_dir_all(&config.scratch_dir).await?;

        Ok(Self {
            config,
            extractor,
            transcriber,
            muxer,
        })
    }

    pub fn config(&self) -> &SubWhizConfig {
        &self.config
    }

    pub fn plan_job(&self, video_path: &Path, options: &ProcessOptions) -> Result<VideoJob> {
        let stem = get_file_stem(video_path)?;
        let subtitle_dir = if options.output_srt {
            &self.config.output_dir
        } else {
            &self.config.scratch_dir
        };

        Ok(VideoJob {
            input_path: video_path.to_path_buf(),
            audio_path: get_audio_path(&self.config.scratch_dir, &stem),
            subtitle_path: get_subtitle_path(subtitle_dir, &stem),
            output_path: get_output_video_path(&self.config.output_dir, &stem),
        })
    }

    /// Run every video through the pipeline, one at a time and in order.
    pub async fn process_videos(
        &self,
        video_paths: &[PathBuf],
        options: &ProcessOptions,
    ) -> std::result::Result<BatchOutcome, VideoFailure> {
        let mut outcome = BatchOutcome::default();
        let mut planned_outputs = HashSet::new();

        for video_path in video_paths {
            let result = match self.plan_job(video_path, options) {
                Ok(job) if !planned_outputs.insert(job.output_path.clone()) => Err((
                    Stage::Plan,
                    SubWhizError::invalid_input(format!(
                        "{} shares its file name with an earlier video in this batch",
                        video_path.display()
                    )),
                )),
                Ok(job) => self.process_video(&job, options).await.map(|()| job),
                Err(e) => Err((Stage::Plan, e)),
            };

            match result {
                Ok(job) => outcome.jobs.push(job),
                Err((stage, e)) => {
                    error!(video = %video_path.display(), stage = %stage, error = %e, "video failed");
                    let failure = VideoFailure {
                        input_path: video_path.clone(),
                        stage,
                        error: e,
                    };
                    match self.config.failure_policy {
                        FailurePolicy::AbortBatch => return Err(failure),
                        FailurePolicy::SkipVideo => outcome.failures.push(failure),
                    }
                }
            }
        }

        Ok(outcome)
    }

    fn announce(&self, message: &str) {
        if self.config.verbose {
            info!("{}", message);
        } else {
            debug!("{}", message);
        }
    }

    async fn process_video(
        &self,
        job: &VideoJob,
        options: &ProcessOptions,
    ) -> std::result::Result<(), (Stage, SubWhizError)> {
        let name = job.input_path.display();

        if fs::metadata(&job.input_path).await.is_err() {
            return Err((
                Stage::Extract,
                SubWhizError::invalid_input(format!("video not found: {}", name)),
            ));
        }

        self.announce(&format!("Extracting audio from {}...", name));
        self.extractor
            .extract_audio(&job.input_path, &job.audio_path)
            .await
            .map_err(|e| (Stage::Extract, e))?;

        self.announce(&format!("Generating subtitles for {}...", name));
        let transcript = self
            .transcriber
            .transcribe(&job.audio_path, options.task, &self.config.language)
            .await;
        self.transcriber.release_cache();
        if !options.keep_audio {
            remove_scratch(&job.audio_path).await;
        }
        let transcript = transcript.map_err(|e| (Stage::Transcribe, e))?;
        debug!(
            language = %transcript.language,
            segments = transcript.segments.len(),
            "transcription finished"
        );

        write_subtitle_file(
            &job.subtitle_path,
            &transcript.segments,
            options.word_by_word,
        )
        .await
        .map_err(|e| (Stage::Serialize, e))?;

        if options.srt_only {
            return Ok(());
        }

        self.announce(&format!("Adding subtitles to {}...", name));
        let stem = get_file_stem(&job.input_path).map_err(|e| (Stage::Mux, e))?;
        let scratch_video = get_scratch_video_path(&self.config.scratch_dir, &stem);
        if let Err(e) = self
            .muxer
            .mux(
                &job.input_path,
                &job.subtitle_path,
                options.font.as_ref(),
                &scratch_video,
            )
            .await
        {
            if let SubWhizError::MuxFailure { reason, .. } = &e {
                error!("ffmpeg error: {}", reason);
            }
            remove_scratch(&scratch_video).await;
            return Err((Stage::Mux, e));
        }

        relocate(&scratch_video, &job.output_path)
            .await
            .map_err(|e| (Stage::Relocate, e))?;

        let saved = std::path::absolute(&job.output_path).unwrap_or_else(|_| job.output_path.clone());
        self.announce(&format!("Saved subtitled video to {}.", saved.display()));

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::types::{Transcript, TranscriptSegment, WordEntry};

    #[derive(Clone, Default)]
    struct Calls {
        extract: Arc<AtomicUsize>,
        transcribe: Arc<AtomicUsize>,
        release: Arc<AtomicUsize>,
        mux: Arc<AtomicUsize>,
        tasks: Arc<Mutex<Vec<Task>>>,
    }

    struct FakeExtractor(Calls);

    #[async_trait]
    impl AudioExtractor for FakeExtractor {
        async fn extract_audio(&self, video_path: &Path, audio_path: &Path) -> Result<()> {
            self.0.extract.fetch_add(1, Ordering::SeqCst);
            if video_path.to_string_lossy().contains("corrupt") {
                return Err(SubWhizError::ExtractionFailure {
                    video_path: video_path.to_path_buf(),
                    reason: "Invalid data found when processing input".to_string(),
                });
            }
            fs::write(audio_path, b"RIFF").await?;
            Ok(())
        }
    }

    struct FakeTranscriber(Calls);

    #[async_trait]
    impl Transcriber for FakeTranscriber {
        async fn transcribe(
            &self,
            audio_path: &Path,
            task: Task,
            language: &str,
        ) -> Result<Transcript> {
            self.0.transcribe.fetch_add(1, Ordering::SeqCst);
            self.0.tasks.lock().unwrap().push(task);
            assert!(audio_path.exists());
            Ok(Transcript {
                language: language.to_string(),
                segments: vec![
                    TranscriptSegment::new("Hola", 0.0, 1.0)
                        .with_words(vec![WordEntry::new("Hola", 0.0, 1.0)]),
                    TranscriptSegment::new("mundo", 1.5, 2.2),
                ],
            })
        }

        fn release_cache(&self) {
            self.0.release.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct FakeMuxer {
        calls: Calls,
        fail: bool,
    }

    #[async_trait]
    impl VideoMuxer for FakeMuxer {
        async fn mux(
            &self,
            video_path: &Path,
            subtitle_path: &Path,
            _font: Option<&FontOverride>,
            output_path: &Path,
        ) -> Result<()> {
            self.calls.mux.fetch_add(1, Ordering::SeqCst);
            assert!(subtitle_path.exists());
            fs::write(output_path, b"partial").await?;
            if self.fail {
                return Err(SubWhizError::MuxFailure {
                    video_path: video_path.to_path_buf(),
                    reason: "Error initializing filter 'subtitles'".to_string(),
                });
            }
            fs::write(output_path, b"muxed").await?;
            Ok(())
        }
    }

    struct Fixture {
        _root: TempDir,
        input_dir: PathBuf,
        output_dir: PathBuf,
        scratch_dir: PathBuf,
        calls: Calls,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            let input_dir = root.path().join("in");
            std::fs::create_dir_all(&input_dir).unwrap();
            Self {
                input_dir,
                output_dir: root.path().join("out"),
                scratch_dir: root.path().join("scratch"),
                _root: root,
                calls: Calls::default(),
            }
        }

        fn video(&self, name: &str) -> PathBuf {
            let path = self.input_dir.join(name);
            std::fs::write(&path, b"video").unwrap();
            path
        }

        async fn subwhiz(&self, policy: FailurePolicy, mux_fails: bool) -> SubWhiz {
            let config = SubWhizConfig::new(&self.output_dir)
                .with_scratch_dir(&self.scratch_dir)
                .with_failure_policy(policy);
            SubWhiz::new(
                config,
                Box::new(FakeExtractor(self.calls.clone())),
                Box::new(FakeTranscriber(self.calls.clone())),
                Box::new(FakeMuxer {
                    calls: self.calls.clone(),
                    fail: mux_fails,
                }),
            )
            .await
            .unwrap()
        }
    }

    #[tokio::test]
    async fn new_creates_output_dir() {
        let fx = Fixture::new();
        assert!(!fx.output_dir.exists());
        fx.subwhiz(FailurePolicy::AbortBatch, false).await;
        assert!(fx.output_dir.is_dir());
    }

    #[tokio::test]
    async fn srt_only_returns_subtitles_without_muxing() {
        let fx = Fixture::new();
        let videos = vec![fx.video("a.mp4"), fx.video("b.mkv")];
        let subwhiz = fx.subwhiz(FailurePolicy::AbortBatch, false).await;

        let options = ProcessOptions {
            srt_only: true,
            ..Default::default()
        };
        let outcome = subwhiz.process_videos(&videos, &options).await.unwrap();

        let subtitles: Vec<_> = outcome.subtitles().collect();
        assert_eq!(subtitles.len(), 2);
        assert_eq!(subtitles[0].0, videos[0].as_path());
        assert_eq!(subtitles[1].1, fx.scratch_dir.join("b.srt").as_path());
        for (_, srt) in subtitles {
            assert!(srt.exists());
        }

        assert_eq!(fx.calls.mux.load(Ordering::SeqCst), 0);
        assert!(!fx.output_dir.join("a.mp4").exists());
        assert!(!fx.output_dir.join("b.mp4").exists());
    }

    #[tokio::test]
    async fn full_run_writes_videos_and_persists_srt() {
        let fx = Fixture::new();
        let videos = vec![fx.video("talk.mov")];
        let subwhiz = fx.subwhiz(FailurePolicy::AbortBatch, false).await;

        let options = ProcessOptions {
            output_srt: true,
            task: Task::Translate,
            ..Default::default()
        };
        let outcome = subwhiz.process_videos(&videos, &options).await.unwrap();

        let job = &outcome.jobs[0];
        assert_eq!(job.subtitle_path, fx.output_dir.join("talk.srt"));
        assert_eq!(job.output_path, fx.output_dir.join("talk.mp4"));
        assert_eq!(std::fs::read(&job.output_path).unwrap(), b"muxed");
        assert!(!fx.scratch_dir.join("talk_temp.mp4").exists());
        assert!(!job.audio_path.exists());
        assert_eq!(*fx.calls.tasks.lock().unwrap(), vec![Task::Translate]);

        let srt = std::fs::read_to_string(&job.subtitle_path).unwrap();
        assert_eq!(
            srt,
            "1\n00:00:00,000 --> 00:00:01,000\nHola\n\n2\n00:00:01,500 --> 00:00:02,200\nmundo\n\n"
        );
    }

    #[tokio::test]
    async fn word_by_word_uses_word_entries() {
        let fx = Fixture::new();
        let videos = vec![fx.video("a.mp4")];
        let subwhiz = fx.subwhiz(FailurePolicy::AbortBatch, false).await;

        let options = ProcessOptions {
            srt_only: true,
            word_by_word: true,
            keep_audio: true,
            ..Default::default()
        };
        let outcome = subwhiz.process_videos(&videos, &options).await.unwrap();

        let srt = std::fs::read_to_string(&outcome.jobs[0].subtitle_path).unwrap();
        assert_eq!(srt, "1\n00:00:00,000 --> 00:00:01,000\nHola\n\n");
        assert!(outcome.jobs[0].audio_path.exists());
    }

    #[tokio::test]
    async fn mux_failure_leaves_no_final_output() {
        let fx = Fixture::new();
        let videos = vec![fx.video("a.mp4")];
        let subwhiz = fx.subwhiz(FailurePolicy::AbortBatch, true).await;

        let err = subwhiz
            .process_videos(&videos, &ProcessOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Mux);
        assert_eq!(err.input_path, videos[0]);
        assert!(matches!(err.error, SubWhizError::MuxFailure { .. }));
        assert!(err.to_string().contains("mux stage"));
        assert!(!fx.output_dir.join("a.mp4").exists());
        assert!(!fx.scratch_dir.join("a_temp.mp4").exists());
    }

    #[tokio::test]
    async fn abort_batch_stops_at_first_failure() {
        let fx = Fixture::new();
        let videos = vec![fx.video("corrupt.mp4"), fx.video("fine.mp4")];
        let subwhiz = fx.subwhiz(FailurePolicy::AbortBatch, false).await;

        let err = subwhiz
            .process_videos(&videos, &ProcessOptions::default())
            .await
            .unwrap_err();

        assert_eq!(err.stage, Stage::Extract);
        assert!(matches!(err.error, SubWhizError::ExtractionFailure { .. }));
        assert_eq!(fx.calls.extract.load(Ordering::SeqCst), 1);
        assert_eq!(fx.calls.transcribe.load(Ordering::SeqCst), 0);
        assert!(!fx.output_dir.join("fine.mp4").exists());
    }

    #[tokio::test]
    async fn skip_video_isolates_failures() {
        let fx = Fixture::new();
        let missing = fx.input_dir.join("missing.mp4");
        let videos = vec![fx.video("corrupt.mp4"), missing.clone(), fx.video("fine.mp4")];
        let subwhiz = fx.subwhiz(FailurePolicy::SkipVideo, false).await;

        let outcome = subwhiz
            .process_videos(&videos, &ProcessOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.jobs.len(), 1);
        assert!(fx.output_dir.join("fine.mp4").exists());

        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.failures[0].stage, Stage::Extract);
        assert!(matches!(
            outcome.failures[0].error,
            SubWhizError::ExtractionFailure { .. }
        ));
        assert_eq!(outcome.failures[1].input_path, missing);
        assert!(matches!(
            outcome.failures[1].error,
            SubWhizError::InvalidInput { .. }
        ));
    }

    #[tokio::test]
    async fn same_file_name_twice_in_one_batch_is_rejected() {
        let fx = Fixture::new();
        let other_dir = fx.input_dir.join("other");
        std::fs::create_dir_all(&other_dir).unwrap();
        let duplicate = other_dir.join("clip.mp4");
        std::fs::write(&duplicate, b"video").unwrap();
        let videos = vec![fx.video("clip.mp4"), duplicate.clone()];
        let subwhiz = fx.subwhiz(FailurePolicy::SkipVideo, false).await;

        let outcome = subwhiz
            .process_videos(&videos, &ProcessOptions::default())
            .await
            .unwrap();

        assert_eq!(outcome.jobs.len(), 1);
        assert_eq!(outcome.jobs[0].input_path, videos[0]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].input_path, duplicate);
        assert_eq!(outcome.failures[0].stage, Stage::Plan);
        assert!(matches!(
            outcome.failures[0].error,
            SubWhizError::InvalidInput { .. }
        ));
        assert_eq!(fx.calls.extract.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn releases_transcriber_cache_after_each_video() {
        let fx = Fixture::new();
        let videos = vec![fx.video("a.mp4"), fx.video("b.mp4"), fx.video("c.mp4")];
        let subwhiz = fx.subwhiz(FailurePolicy::AbortBatch, false).await;

        let options = ProcessOptions {
            srt_only: true,
            ..Default::default()
        };
        subwhiz.process_videos(&videos, &options).await.unwrap();

        assert_eq!(fx.calls.transcribe.load(Ordering::SeqCst), 3);
        assert_eq!(fx.calls.release.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn relocate_moves_file() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("x_temp.mp4");
        let to = dir.path().join("x.mp4");
        std::fs::write(&from, b"data").unwrap();

        relocate(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"data");
    }

    #[tokio::test]
    async fn copy_into_place_replaces_scratch_copy() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("x_temp.mp4");
        let partial = dir.path().join("x.mp4.partial");
        let to = dir.path().join("x.mp4");
        std::fs::write(&from, b"data").unwrap();

        copy_into_place(&from, &partial, &to).await.unwrap();

        assert!(!from.exists());
        assert!(!partial.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"data");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn copy_into_place_cleans_partial_when_rename_fails() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("x_temp.mp4");
        let partial = dir.path().join("x.mp4.partial");
        let to = dir.path().join("x.mp4");
        std::fs::write(&from, b"data").unwrap();
        // a non-empty directory cannot be replaced by a file
        std::fs::create_dir_all(to.join("occupied")).unwrap();

        let err = copy_into_place(&from, &partial, &to).await.unwrap_err();

        assert!(matches!(err, SubWhizError::IoError(_)));
        assert!(!partial.exists());
        assert!(to.is_dir());
        assert!(from.exists());
    }

    #[tokio::test]
    async fn copy_into_place_missing_source_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("x.mp4.partial");
        let to = dir.path().join("x.mp4");

        let err = copy_into_place(&dir.path().join("gone.mp4"), &partial, &to)
            .await
            .unwrap_err();

        assert!(matches!(err, SubWhizError::IoError(_)));
        assert!(!partial.exists());
        assert!(!to.exists());
    }
}
