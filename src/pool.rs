//! Fans jobs out over a fixed number of worker threads.

use std::{
    any::Any,
    collections::BTreeMap,
    fmt,
    io,
    panic::{self, AssertUnwindSafe},
    path::PathBuf,
    process::{Command, Stdio},
    sync::{mpsc, Mutex},
    thread,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    codec::AudioCodec,
    error::{ErrorKind, PipelineResult},
    pipeline::Job,
};

/// Where a unit of work executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Isolation {
    /// A child process per unit, so a crash only takes out that unit.
    #[default]
    Process,
    /// Directly on the pool thread.
    Thread,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Succeeded { detail: String },
    Failed { kind: ErrorKind, message: String },
}

/// What happened to one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub outcome: Outcome,
}

impl UnitReport {
    pub fn from_result(job: &Job, result: PipelineResult<String>) -> Self {
        let outcome = match result {
            Ok(detail) => Outcome::Succeeded { detail },
            Err(err) => Outcome::Failed {
                kind: err.kind(),
                message: err.to_string(),
            },
        };
        Self {
            input: job.input().to_path_buf(),
            output: job.output().to_path_buf(),
            outcome,
        }
    }

    pub fn crashed(job: &Job, message: impl Into<String>) -> Self {
        Self {
            input: job.input().to_path_buf(),
            output: job.output().to_path_buf(),
            outcome: Outcome::Failed {
                kind: ErrorKind::Crashed,
                message: message.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded { .. })
    }
}

impl fmt::Display for UnitReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.outcome {
            Outcome::Succeeded { .. } => {
                write!(f, "✔ {} -> {}", self.input.display(), self.output.display())
            }
            Outcome::Failed { message, .. } => write!(f, "✘ {}: {message}", self.input.display()),
        }
    }
}

/// Executes one job and always produces a report.
pub trait UnitRunner: Sync {
    fn run(&self, job: &Job) -> UnitReport;
}

/// Runs jobs on the calling thread. Panics become `Crashed` reports.
#[derive(Debug, Clone, Default)]
pub struct InProcess<C> {
    codec: C,
}

impl<C> InProcess<C> {
    pub fn new(codec: C) -> Self {
        Self { codec }
    }
}

impl<C: AudioCodec + Sync> UnitRunner for InProcess<C> {
    fn run(&self, job: &Job) -> UnitReport {
        match panic::catch_unwind(AssertUnwindSafe(|| job.run(&self.codec))) {
            Ok(result) => UnitReport::from_result(job, result),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(input = %job.input().display(), message, "Unit panicked");
                UnitReport::crashed(job, format!("worker panicked: {message}"))
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs each job in `<program> worker --job <json>` and reads the report the
/// child prints as the last line of its stdout.
#[derive(Debug, Clone)]
pub struct ChildProcess {
    program: PathBuf,
}

impl ChildProcess {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Re-executes the running binary.
    pub fn current_exe() -> io::Result<Self> {
        std::env::current_exe().map(Self::new)
    }
}

impl UnitRunner for ChildProcess {
    fn run(&self, job: &Job) -> UnitReport {
        let payload = match serde_json::to_string(job) {
            Ok(payload) => payload,
            Err(e) => return UnitReport::crashed(job, format!("cannot serialize job: {e}")),
        };

        let output = Command::new(&self.program)
            .arg("worker")
            .arg("--job")
            .arg(&payload)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output();
        let output = match output {
            Ok(output) => output,
            Err(e) => return UnitReport::crashed(job, format!("cannot start worker: {e}")),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let report = stdout
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .and_then(|line| serde_json::from_str::<UnitReport>(line).ok());

        match report {
            Some(report) if output.status.success() => report,
            _ => {
                warn!(input = %job.input().display(), status = %output.status, "Worker failed");
                UnitReport::crashed(job, format!("worker exited with {}", output.status))
            }
        }
    }
}

/// A bounded set of worker threads fed from a shared queue.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// One worker per available core.
    pub fn with_available_parallelism() -> Self {
        Self::new(thread::available_parallelism().map_or(1, |n| n.get()))
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Runs every job and returns the reports in submission order.
    ///
    /// `on_report` sees each report as soon as all earlier ones are known, so
    /// callers can print progressively without reordering.
    pub fn run<R: UnitRunner>(
        &self,
        runner: &R,
        jobs: Vec<Job>,
        mut on_report: impl FnMut(usize, &UnitReport),
    ) -> Vec<UnitReport> {
        let total = jobs.len();
        let (job_tx, job_rx) = mpsc::channel::<(usize, Job)>();
        for entry in jobs.into_iter().enumerate() {
            // The receiver lives until the end of this function.
            let _ = job_tx.send(entry);
        }
        drop(job_tx);
        let job_rx = Mutex::new(job_rx);

        let (report_tx, report_rx) = mpsc::channel::<(usize, UnitReport)>();

        thread::scope(|scope| {
            for worker in 0..self.workers.min(total) {
                let report_tx = report_tx.clone();
                let job_rx = &job_rx;
                scope.spawn(move || loop {
                    let next = match job_rx.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    let Ok((index, job)) = next else {
                        break;
                    };
                    debug!(worker, index, input = %job.input().display(), "Unit started");
                    let report = runner.run(&job);
                    if report_tx.send((index, report)).is_err() {
                        break;
                    }
                });
            }
            drop(report_tx);

            let mut pending = BTreeMap::new();
            let mut reports = Vec::with_capacity(total);
            for (index, report) in report_rx {
                pending.insert(index, report);
                while let Some(report) = pending.remove(&reports.len()) {
                    on_report(reports.len(), &report);
                    reports.push(report);
                }
            }
            reports
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{path::Path, time::Duration};

    use super::*;
    use crate::{
        codec::OutputFormat,
        config::TrimConfig,
        error::{CodecError, PipelineError},
        pipeline::TrimJob,
        waveform::Waveform,
    };

    fn job(name: &str) -> Job {
        Job::Trim(TrimJob {
            input: PathBuf::from(format!("{name}.wav")),
            output: PathBuf::from(format!("out/{name}_processed.wav")),
            format: OutputFormat::Wav,
            config: TrimConfig::default(),
        })
    }

    /// Finishes later jobs first and fails inputs whose name starts with "bad".
    struct Scripted;

    impl UnitRunner for Scripted {
        fn run(&self, job: &Job) -> UnitReport {
            let name = job.input().to_string_lossy().to_string();
            let delay: u64 = name
                .trim_start_matches(|c: char| !c.is_ascii_digit())
                .trim_end_matches(".wav")
                .parse()
                .unwrap_or(0);
            thread::sleep(Duration::from_millis(delay));
            if name.starts_with("bad") {
                UnitReport::from_result(job, Err(PipelineError::InvalidConfig("scripted".into())))
            } else {
                UnitReport::from_result(job, Ok("done".into()))
            }
        }
    }

    #[test]
    fn reports_in_submission_order() {
        let jobs: Vec<Job> = ["a60", "b40", "c20", "d0"].into_iter().map(job).collect();
        let mut seen = Vec::new();
        let reports = WorkerPool::new(4).run(&Scripted, jobs, |index, report| {
            seen.push((index, report.input.clone()));
        });

        let inputs: Vec<_> = reports.iter().map(|r| r.input.clone()).collect();
        let expected: Vec<PathBuf> = ["a60.wav", "b40.wav", "c20.wav", "d0.wav"]
            .into_iter()
            .map(PathBuf::from)
            .collect();
        assert_eq!(inputs, expected);
        assert_eq!(seen.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert_eq!(seen.into_iter().map(|(_, p)| p).collect::<Vec<_>>(), expected);
    }

    #[test]
    fn one_failure_does_not_stop_the_batch() {
        let jobs: Vec<Job> = ["a0", "bad0", "c0"].into_iter().map(job).collect();
        let reports = WorkerPool::new(2).run(&Scripted, jobs, |_, _| {});

        assert_eq!(reports.len(), 3);
        assert!(reports[0].is_success());
        assert!(matches!(
            reports[1].outcome,
            Outcome::Failed { kind: ErrorKind::InvalidConfig, .. }
        ));
        assert!(reports[2].is_success());
    }

    #[test]
    fn empty_batch_yields_no_reports() {
        let reports = WorkerPool::new(3).run(&Scripted, Vec::new(), |_, _| {
            panic!("no reports expected")
        });
        assert!(reports.is_empty());
    }

    struct PanickingCodec;

    impl AudioCodec for PanickingCodec {
        fn decode(&self, _: &Path) -> Result<Waveform, CodecError> {
            panic!("decoder blew up")
        }

        fn encode(&self, _: &Waveform, _: &Path, _: OutputFormat) -> Result<(), CodecError> {
            Ok(())
        }
    }

    #[test]
    fn panics_become_crashed_reports() {
        let report = InProcess::new(PanickingCodec).run(&job("a"));
        match report.outcome {
            Outcome::Failed { kind, message } => {
                assert_eq!(kind, ErrorKind::Crashed);
                assert!(message.contains("decoder blew up"), "{message}");
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn missing_worker_binary_is_a_crash() {
        let runner = ChildProcess::new("/nonexistent/resplice-worker");
        let report = runner.run(&job("a"));
        assert!(matches!(
            report.outcome,
            Outcome::Failed { kind: ErrorKind::Crashed, .. }
        ));
    }

    #[test]
    fn report_lines() {
        let ok = UnitReport::from_result(&job("a"), Ok("1.00 s".into()));
        assert_eq!(ok.to_string(), "✔ a.wav -> out/a_processed.wav");

        let failed = UnitReport::from_result(
            &job("b"),
            Err(PipelineError::InsufficientMatches {
                found: 2,
                required: 6,
                matches: vec![1.0, 2.0],
            }),
        );
        assert_eq!(
            failed.to_string(),
            "✘ b.wav: found 2 marker occurrence(s), need 6 (at [1.0, 2.0] s)"
        );

        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("\"kind\":\"insufficient_matches\""));
        assert_eq!(serde_json::from_str::<UnitReport>(&json).unwrap(), failed);
    }
}
