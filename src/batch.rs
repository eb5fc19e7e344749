//! Directory scanning, output naming and the per-file report loop.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::{
    codec::{OutputFormat, INPUT_EXTENSIONS},
    pipeline::Job,
    pool::{UnitReport, UnitRunner, WorkerPool},
};

/// Audio files directly inside `dir`, sorted by name.
pub fn scan_inputs(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut inputs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let path = entry.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| INPUT_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if supported {
            inputs.push(path);
        }
    }
    inputs.sort();
    Ok(inputs)
}

/// `<out_dir>/<stem>_processed.<ext>`
pub fn output_path(input: &Path, out_dir: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    out_dir.join(format!("{stem}_processed.{}", format.extension()))
}

/// Counts printed after a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub processed: usize,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_reports(reports: &[UnitReport]) -> Self {
        Self {
            processed: reports.len(),
            failed: reports.iter().filter(|r| !r.is_success()).count(),
        }
    }
}

impl std::fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "processed {} file(s), {} failed", self.processed, self.failed)
    }
}

/// Runs `jobs` on `pool`, printing one line per file above a progress bar.
pub fn run_batch<R: UnitRunner>(pool: &WorkerPool, runner: &R, jobs: Vec<Job>) -> BatchSummary {
    let pb = ProgressBar::new(jobs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .progress_chars("#>-"),
    );

    info!(files = jobs.len(), workers = pool.workers(), "Starting batch");
    let reports = pool.run(runner, jobs, |_, report| {
        pb.println(report.to_string());
        pb.inc(1);
    });
    pb.finish_and_clear();

    let summary = BatchSummary::from_reports(&reports);
    info!(processed = summary.processed, failed = summary.failed, "Batch finished");
    summary
}

#[cfg(test)]
mod tests {
    use std::fs::File;

    use super::*;
    use crate::{
        config::TrimConfig,
        error::PipelineError,
        pipeline::TrimJob,
    };

    #[test]
    fn scans_supported_files_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.WAV", "a.mp3", "c.flac", "notes.txt", "d"] {
            File::create(dir.path().join(name)).unwrap();
        }
        fs::create_dir(dir.path().join("nested.wav")).unwrap();

        let names: Vec<_> = scan_inputs(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.mp3", "b.WAV", "c.flac"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(scan_inputs(Path::new("/nonexistent/inputs")).is_err());
    }

    #[test]
    fn names_outputs_after_inputs() {
        let out = Path::new("/out");
        assert_eq!(
            output_path(Path::new("/in/exam 1.mp3"), out, OutputFormat::Wav),
            PathBuf::from("/out/exam 1_processed.wav")
        );
        assert_eq!(
            output_path(Path::new("/in/take.flac"), out, OutputFormat::Wav32),
            PathBuf::from("/out/take_processed.wav")
        );
    }

    struct FailSecond;

    impl UnitRunner for FailSecond {
        fn run(&self, job: &Job) -> UnitReport {
            if job.input().ends_with("2.wav") {
                UnitReport::from_result(job, Err(PipelineError::InvalidConfig("nope".into())))
            } else {
                UnitReport::from_result(job, Ok(String::new()))
            }
        }
    }

    #[test]
    fn summarizes_failures() {
        let jobs = (1..=3)
            .map(|i| {
                Job::Trim(TrimJob {
                    input: PathBuf::from(format!("{i}.wav")),
                    output: PathBuf::from(format!("{i}_processed.wav")),
                    format: OutputFormat::Wav,
                    config: TrimConfig::default(),
                })
            })
            .collect();
        let summary = run_batch(&WorkerPool::new(2), &FailSecond, jobs);
        assert_eq!(summary, BatchSummary { processed: 3, failed: 1 });
        assert_eq!(summary.to_string(), "processed 3 file(s), 1 failed");
    }
}
