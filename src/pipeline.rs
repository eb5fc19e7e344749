//! One file's worth of work, from decode to encode.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    codec::{AudioCodec, OutputFormat},
    config::{PipelineConfig, TrimConfig},
    error::{PipelineError, PipelineResult},
    gap::{GapDetector, GapWindow},
    reconstruct::SegmentReconstructor,
    stretch::DurationNormalizer,
    trim::trim_and_gain,
    waveform::Waveform,
};

/// Rebuild one recording with repeated segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub reference: PathBuf,
    pub format: OutputFormat,
    pub config: PipelineConfig,
}

/// Trim and amplify one recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrimJob {
    pub input: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    pub config: TrimConfig,
}

/// A unit of work handed to the worker pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Job {
    Repeat(RepeatJob),
    Trim(TrimJob),
}

impl Job {
    pub fn input(&self) -> &Path {
        match self {
            Self::Repeat(job) => &job.input,
            Self::Trim(job) => &job.input,
        }
    }

    pub fn output(&self) -> &Path {
        match self {
            Self::Repeat(job) => &job.output,
            Self::Trim(job) => &job.output,
        }
    }

    /// Runs the job and returns a one-line description of what was written.
    pub fn run(&self, codec: &impl AudioCodec) -> PipelineResult<String> {
        match self {
            Self::Repeat(job) => {
                let summary = run_repeat(codec, job)?;
                Ok(format!(
                    "{:.2} s, markers at {}",
                    summary.output_duration,
                    summary
                        .gaps
                        .iter()
                        .map(|g| format!("{:.2}", g.match_time))
                        .collect::<Vec<_>>()
                        .join("/")
                ))
            }
            Self::Trim(job) => {
                let duration = run_trim(codec, job)?;
                Ok(format!("{duration:.2} s"))
            }
        }
    }
}

/// What a repeat job found and produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatSummary {
    pub gaps: Vec<GapWindow>,
    pub input_duration: f64,
    pub reconstructed_duration: f64,
    pub output_duration: f64,
}

/// Analysis, reconstruction and stretching without any file access.
///
/// `source` and `reference` may be at any sample rate; analysis happens at the
/// configured rate and the output keeps the source's rate and duration.
pub fn repeat_segments(
    source: &Waveform,
    reference: &Waveform,
    config: &PipelineConfig,
) -> PipelineResult<(RepeatSummary, Waveform)> {
    config.validate()?;

    let analysis_source = source.resample(config.analysis_rate)?;
    let analysis_reference = reference.resample(config.analysis_rate)?;
    let gaps = GapDetector::new(config).detect(&analysis_source, &analysis_reference)?;

    let reconstructed = SegmentReconstructor::new(config).reconstruct(source, &gaps)?;
    let output = DurationNormalizer::new(config).normalize(&reconstructed, source.duration());

    let summary = RepeatSummary {
        gaps,
        input_duration: source.duration(),
        reconstructed_duration: reconstructed.duration(),
        output_duration: output.duration(),
    };
    debug!(summary = ?summary, "Repeat pipeline complete");
    Ok((summary, output))
}

pub fn run_repeat(codec: &impl AudioCodec, job: &RepeatJob) -> PipelineResult<RepeatSummary> {
    info!(input = %job.input.display(), "Processing");

    let source = codec
        .decode(&job.input)
        .map_err(|e| PipelineError::decode(&job.input, e))?;
    let reference = codec
        .decode(&job.reference)
        .map_err(|e| PipelineError::decode(&job.reference, e))?;

    let (summary, output) = repeat_segments(&source, &reference, &job.config)?;

    codec
        .encode(&output, &job.output, job.format)
        .map_err(|e| PipelineError::encode(&job.output, e))?;

    info!(
        output = %job.output.display(),
        duration = summary.output_duration,
        "Wrote repeat version"
    );
    Ok(summary)
}

/// Returns the duration of the written file in seconds.
pub fn run_trim(codec: &impl AudioCodec, job: &TrimJob) -> PipelineResult<f64> {
    info!(input = %job.input.display(), "Processing");

    let source = codec
        .decode(&job.input)
        .map_err(|e| PipelineError::decode(&job.input, e))?;
    let output = trim_and_gain(&source, &job.config);

    codec
        .encode(&output, &job.output, job.format)
        .map_err(|e| PipelineError::encode(&job.output, e))?;

    info!(output = %job.output.display(), duration = output.duration(), "Wrote trimmed file");
    Ok(output.duration())
}
