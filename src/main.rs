use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use resplice::{
    batch::{output_path, run_batch, scan_inputs},
    codec::{FileCodec, OutputFormat},
    config::{PipelineConfig, TrimConfig},
    pipeline::{Job, RepeatJob, TrimJob},
    pool::{ChildProcess, InProcess, Isolation, UnitReport, UnitRunner, WorkerPool},
};

#[derive(Parser)]
#[command(name = "resplice")]
#[command(about = "Rebuild exam recordings so every section between markers is heard twice")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Repeat the segments between marker occurrences
    Repeat {
        #[command(flatten)]
        batch: BatchArgs,

        /// Marker clip to search for
        #[arg(long)]
        reference: PathBuf,

        /// Minimum normalized correlation for a marker match
        #[arg(long, default_value = "0.8")]
        threshold: f32,

        /// Only search the first N seconds for markers
        #[arg(long, default_value = "300")]
        analysis_cap: f64,

        /// Silence threshold relative to the loudest frame, in dB
        #[arg(long, default_value = "-40", allow_negative_numbers = true)]
        silence_db: f32,

        /// STFT frame length for silence detection
        #[arg(long, default_value = "2048")]
        frame_length: usize,

        /// STFT hop length for silence detection
        #[arg(long, default_value = "1024")]
        hop_length: usize,

        /// Silence between the two copies of a repeated segment, in ms
        #[arg(long, default_value = "2000")]
        repeat_silence_ms: u64,

        /// Sample rate used for marker and silence analysis
        #[arg(long, default_value = "22050")]
        analysis_rate: u32,
    },

    /// Trim and amplify recordings
    Trim {
        #[command(flatten)]
        batch: BatchArgs,

        /// Seconds to drop from the start
        #[arg(long, default_value = "0")]
        trim_start: f64,

        /// Keep audio up to this time in seconds (0 = until the end)
        #[arg(long, default_value = "0")]
        trim_end: f64,

        /// Gain in dB
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        gain: f32,
    },

    /// Process a single job and print its report as JSON
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        job: String,
    },
}

#[derive(Args)]
struct BatchArgs {
    /// Directory containing mp3/wav/flac recordings
    #[arg(short, long)]
    input: PathBuf,

    /// Directory for processed files (created if missing)
    #[arg(short, long)]
    output: PathBuf,

    /// Output format: wav (16-bit PCM) or wav32 (32-bit float). MP3 and other
    /// compressed containers cannot be written
    #[arg(long, default_value = "wav")]
    format: OutputFormat,

    /// Number of files processed concurrently (default: available cores)
    #[arg(long)]
    workers: Option<usize>,

    /// Run each file in its own process or on a pool thread
    #[arg(long, value_enum, default_value = "process")]
    isolation: Isolation,
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("resplice=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(io::stderr),
            )
            .with(env_filter)
            .init();
    }
}

fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Commands::Repeat {
            batch,
            reference,
            threshold,
            analysis_cap,
            silence_db,
            frame_length,
            hop_length,
            repeat_silence_ms,
            analysis_rate,
        } => {
            let config = PipelineConfig::default()
                .with_threshold(threshold)
                .with_analysis_cap_secs(analysis_cap)
                .with_silence_threshold_db(silence_db)
                .with_frames(frame_length, hop_length)
                .with_repeat_silence_ms(repeat_silence_ms)
                .with_analysis_rate(analysis_rate);
            config.validate()?;

            run(&batch, |input, output| {
                Job::Repeat(RepeatJob {
                    input,
                    output,
                    reference: reference.clone(),
                    format: batch.format,
                    config: config.clone(),
                })
            })
        }
        Commands::Trim {
            batch,
            trim_start,
            trim_end,
            gain,
        } => {
            let config = TrimConfig {
                trim_start,
                trim_end,
                gain_db: gain,
            };
            run(&batch, |input, output| {
                Job::Trim(TrimJob {
                    input,
                    output,
                    format: batch.format,
                    config: config.clone(),
                })
            })
        }
        Commands::Worker { job } => worker(&job),
    }
}

fn run(batch: &BatchArgs, make_job: impl Fn(PathBuf, PathBuf) -> Job) -> Result<()> {
    let inputs = scan_inputs(&batch.input)
        .with_context(|| format!("cannot read input directory {}", batch.input.display()))?;
    if inputs.is_empty() {
        println!("No audio files found in {}", batch.input.display());
        return Ok(());
    }

    fs::create_dir_all(&batch.output)
        .with_context(|| format!("cannot create output directory {}", batch.output.display()))?;

    let jobs: Vec<Job> = inputs
        .into_iter()
        .map(|input| {
            let output = output_path(&input, &batch.output, batch.format);
            make_job(input, output)
        })
        .collect();

    let pool = batch
        .workers
        .map_or_else(WorkerPool::with_available_parallelism, WorkerPool::new);

    let summary = match batch.isolation {
        Isolation::Process => {
            let runner = ChildProcess::current_exe().context("cannot locate own executable")?;
            run_batch(&pool, &runner, jobs)
        }
        Isolation::Thread => run_batch(&pool, &InProcess::new(FileCodec), jobs),
    };

    println!("{summary}");
    Ok(())
}

/// Child side of process isolation: stdout carries exactly one JSON report.
fn worker(payload: &str) -> Result<()> {
    let job: Job = serde_json::from_str(payload).context("invalid job payload")?;
    info!(input = %job.input().display(), "Worker started");

    let report: UnitReport = InProcess::new(FileCodec).run(&job);
    if !report.is_success() {
        error!(input = %job.input().display(), "{report}");
    }

    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, &report)?;
    writeln!(stdout)?;
    Ok(())
}
