use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use subwhiz_core::{
    FailurePolicy, FfmpegAudioExtractor, FfmpegVideoMuxer, FontOverride, ProcessOptions, SubWhiz,
    SubWhizConfig, Task, Transcriber, WhisperCliTranscriber,
};

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.0}m {:.0}s", (secs / 60.0).floor(), secs % 60.0)
    }
}

/// CLI wrapper for Task enum (needed for clap ValueEnum)
#[derive(Clone, Default, ValueEnum)]
enum CliTask {
    #[default]
    Transcribe,
    Translate,
}

impl From<CliTask> for Task {
    fn from(cli: CliTask) -> Self {
        match cli {
            CliTask::Transcribe => Task::Transcribe,
            CliTask::Translate => Task::Translate,
        }
    }
}

#[derive(Clone, Default, ValueEnum)]
enum CliBackend {
    /// The `whisper` command line tool
    #[default]
    WhisperCli,
    /// In-process whisper.cpp
    #[cfg(feature = "whisper-rs")]
    WhisperRs,
}

#[derive(Parser)]
#[command(name = "subwhiz")]
#[command(about = "Transcribe videos with Whisper and burn the subtitles into them")]
struct Cli {
    /// Video files to process
    #[arg(required = true)]
    videos: Vec<PathBuf>,

    /// Directory for subtitled videos (and subtitle files with --output-srt)
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Spoken language code passed to Whisper
    #[arg(short, long, default_value = "es")]
    lang: String,

    /// Transcribe in the spoken language or translate to English
    #[arg(short, long, default_value = "transcribe")]
    task: CliTask,

    /// Keep the .srt files in the output directory
    #[arg(long)]
    output_srt: bool,

    /// Only generate .srt files, do not touch the videos
    #[arg(long)]
    srt_only: bool,

    /// One subtitle per word instead of per phrase
    #[arg(short, long)]
    word_by_word: bool,

    /// Directory containing a custom font
    #[arg(long, requires = "font_name")]
    font_dir: Option<PathBuf>,

    /// Family name of the custom font
    #[arg(long, requires = "font_dir")]
    font_name: Option<String>,

    /// Keep extracted audio in the scratch directory
    #[arg(long)]
    keep_audio: bool,

    /// Continue with the next video when one fails
    #[arg(long)]
    keep_going: bool,

    /// Transcription backend
    #[arg(short, long, default_value = "whisper-cli")]
    backend: CliBackend,

    /// Whisper model (name for whisper-cli, ggml file name for whisper-rs)
    #[arg(short, long)]
    model: Option<String>,

    /// Print progress for every stage
    #[arg(short, long)]
    verbose: bool,
}

fn create_spinner(msg: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")?,
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    Ok(pb)
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn build_transcriber(cli: &Cli) -> Result<Box<dyn Transcriber>> {
    match cli.backend {
        CliBackend::WhisperCli => {
            let model = cli.model.clone().unwrap_or_else(|| "base".to_string());
            Ok(Box::new(WhisperCliTranscriber::new(model)))
        }
        #[cfg(feature = "whisper-rs")]
        CliBackend::WhisperRs => {
            let model_name = cli
                .model
                .as_deref()
                .unwrap_or(subwhiz_core::whisper::DEFAULT_MODEL_NAME);
            println!("{} Checking model...", style("✓").green().bold());
            let model_path = subwhiz_core::ensure_model(model_name).await?;
            Ok(Box::new(subwhiz_core::WhisperRsTranscriber::new(
                &model_path,
                cfg!(feature = "cuda"),
            )?))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    println!(
        "\n{}  {}\n",
        style("subwhiz").cyan().bold(),
        style("Video Subtitler").dim()
    );

    let transcriber = build_transcriber(&cli).await?;

    let policy = if cli.keep_going {
        FailurePolicy::SkipVideo
    } else {
        FailurePolicy::AbortBatch
    };
    let config = SubWhizConfig::new(&cli.output_dir)
        .with_language(&cli.lang)
        .with_verbose(cli.verbose)
        .with_failure_policy(policy);

    let subwhiz = SubWhiz::new(
        config,
        Box::new(FfmpegAudioExtractor::new()),
        transcriber,
        Box::new(FfmpegVideoMuxer::new()),
    )
    .await?;

    let font = match (cli.font_dir.clone(), cli.font_name.clone()) {
        (Some(dir), Some(name)) => Some(FontOverride { dir, name }),
        _ => None,
    };
    let options = ProcessOptions {
        output_srt: cli.output_srt,
        srt_only: cli.srt_only,
        task: cli.task.clone().into(),
        font,
        word_by_word: cli.word_by_word,
        keep_audio: cli.keep_audio,
    };

    let total_start = Instant::now();
    let spinner = if cli.verbose {
        None
    } else {
        Some(create_spinner(&format!(
            "Processing {} video(s)...",
            cli.videos.len()
        ))?)
    };

    let result = subwhiz.process_videos(&cli.videos, &options).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(failure) => {
            eprintln!(
                "{} {} {}",
                style("Error:").red().bold(),
                style(format!("[{}]", failure.stage)).red(),
                failure
            );
            std::process::exit(1);
        }
    };

    info!(
        succeeded = outcome.jobs.len(),
        failed = outcome.failures.len(),
        elapsed = %format_duration(total_start.elapsed()),
        "batch finished"
    );

    for job in &outcome.jobs {
        println!(
            "{} {}",
            style("✓").green().bold(),
            style(job.input_path.display()).dim()
        );
        println!("    {} {}", style("subtitles:").dim(), job.subtitle_path.display());
        if !cli.srt_only {
            println!("    {} {}", style("video:").dim(), job.output_path.display());
        }
    }
    for failure in &outcome.failures {
        warn!(video = %failure.input_path.display(), stage = %failure.stage, "skipped after failure");
        println!(
            "{} {} {}",
            style("✗").red().bold(),
            style(failure.input_path.display()).dim(),
            style(format!("[{}] {}", failure.stage, failure.error)).red()
        );
    }

    println!(
        "\n{} {}\n",
        style("Total time:").dim(),
        style(format_duration(total_start.elapsed())).cyan().bold()
    );

    if !outcome.failures.is_empty() {
        std::process::exit(1);
    }

    Ok(())
}
