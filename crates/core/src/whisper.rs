//! In-process transcription through whisper.cpp (feature `whisper-rs`).

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use async_trait::async_trait;
use tokio::{fs, process::Command};
use tracing::debug;
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, WhisperState,
};

use crate::{
    error::{Result, SubWhizError},
    paths::get_model_dir,
    transcriber::Transcriber,
    types::{Task, Transcript, TranscriptSegment, WordEntry},
};

pub const DEFAULT_MODEL_NAME: &str = "ggml-base.bin";

/// Download a ggml model into the model cache unless it is already there.
pub async fn ensure_model(model_name: &str) -> Result<PathBuf> {
    let download_url = format!(
        "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
        model_name
    );
    let model_dir = get_model_dir();
    fs::create_dir_all(&model_dir).await?;

    let model_path = model_dir.join(model_name);
    if !model_path.exists() {
        let output = Command::new("curl")
            .arg("-L")
            .arg("--fail")
            .arg(&download_url)
            .arg("-o")
            .arg(&model_path)
            .output()
            .await?;

        if !output.status.success() {
            let _ = fs::remove_file(&model_path).await;
            return Err(SubWhizError::TranscriptionFailure {
                audio_path: model_path,
                reason: format!(
                    "model download from {} failed: {}",
                    download_url,
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }
    }

    Ok(model_path)
}

fn read_samples(audio_path: &Path) -> std::result::Result<Vec<f32>, hound::Error> {
    let mut reader = hound::WavReader::open(audio_path)?;
    reader
        .samples::<i16>()
        .map(|s| s.map(|s| s as f32 / i16::MAX as f32))
        .collect()
}

/// Whisper emits sub-word tokens; a leading space starts a new word.
fn push_token(words: &mut Vec<WordEntry>, piece: &str, start: f64, end: f64) {
    match words.last_mut() {
        Some(last) if !piece.starts_with(' ') => {
            last.word.push_str(piece);
            last.end = end;
        }
        _ => words.push(WordEntry::new(piece, start, end)),
    }
}

fn is_special_token(piece: &str) -> bool {
    piece.starts_with("[_") || piece.starts_with("<|")
}

extern "C" fn whisper_log_callback(
    _level: u32,
    _message: *const std::ffi::c_char,
    _user_data: *mut std::ffi::c_void,
) {
    // silent
}

/// Keep whisper.cpp from writing to stderr underneath the progress display.
pub fn silence_native_logs() {
    unsafe {
        whisper_rs::set_log_callback(Some(whisper_log_callback), std::ptr::null_mut());
    }
}

pub struct WhisperRsTranscriber {
    ctx: WhisperContext,
    state: Mutex<Option<WhisperState>>,
}

impl WhisperRsTranscriber {
    pub fn new(model_path: &Path, use_gpu: bool) -> Result<Self> {
        silence_native_logs();
        let ctx_params = WhisperContextParameters {
            use_gpu,
            flash_attn: use_gpu,
            ..Default::default()
        };
        let model_path_str = model_path.to_string_lossy();
        let ctx = WhisperContext::new_with_params(&model_path_str, ctx_params).map_err(|e| {
            SubWhizError::TranscriptionFailure {
                audio_path: model_path.to_path_buf(),
                reason: format!("failed to load model: {}", e),
            }
        })?;

        Ok(Self {
            ctx,
            state: Mutex::new(None),
        })
    }

    fn run(
        &self,
        samples: &[f32],
        task: Task,
        language: &str,
    ) -> std::result::Result<Transcript, String> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| "whisper state lock poisoned".to_string())?;
        let mut state = match guard.take() {
            Some(state) => state,
            None => self.ctx.create_state().map_err(|e| e.to_string())?,
        };

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 5 });
        params.set_language(Some(language));
        params.set_translate(task == Task::Translate);
        params.set_token_timestamps(true);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_special(false);
        params.set_print_timestamps(false);

        state.full(params, samples).map_err(|e| e.to_string())?;

        let mut segments = Vec::new();
        for segment in state.as_iter() {
            let text = match segment.to_str() {
                Ok(s) => s.to_string(),
                Err(_) => continue,
            };

            let mut words = Vec::new();
            for i in 0..segment.n_tokens() {
                let Some(token) = segment.get_token(i) else {
                    continue;
                };
                let Ok(piece) = token.to_str() else {
                    continue;
                };
                if is_special_token(piece) {
                    continue;
                }
                let data = token.token_data();
                push_token(
                    &mut words,
                    piece,
                    data.t0 as f64 / 100.0,
                    data.t1 as f64 / 100.0,
                );
            }

            segments.push(
                TranscriptSegment::new(
                    text,
                    segment.start_timestamp() as f64 / 100.0,
                    segment.end_timestamp() as f64 / 100.0,
                )
                .with_words(words),
            );
        }

        let language_index = state.full_lang_id_from_state();
        let detected = whisper_rs::get_lang_str(language_index)
            .unwrap_or(language)
            .to_string();

        *guard = Some(state);

        Ok(Transcript {
            language: detected,
            segments,
        })
    }
}

#[async_trait]
impl Transcriber for WhisperRsTranscriber {
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

        let samples = read_samples(audio_path).map_err(|e| failure(e.to_string()))?;
        debug!(samples = samples.len(), "loaded audio for whisper");

        self.run(&samples, task, language).map_err(failure)
    }

    fn release_cache(&self) {
        if let Ok(mut guard) = self.state.lock() {
            guard.take();
        }
    }
}
