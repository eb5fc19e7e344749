//! Error types for decoding, analysis and encoding.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for per-file pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Failures at the audio container boundary.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("cannot open file: {0}")]
    Open(#[source] std::io::Error),

    #[error("decoding failed: {0}")]
    Decode(#[from] symphonia::core::errors::Error),

    #[error("no audio track found")]
    NoTrack,

    #[error("stream does not declare a sample rate")]
    UnknownSampleRate,

    #[error("no audio data found in file")]
    Empty,

    #[error("unsupported output format: {0}")]
    UnsupportedFormat(String),

    #[error("encoding failed: {0}")]
    Encode(#[from] hound::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot publish output: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Failures while converting a waveform to the analysis rate.
#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("cannot build resampler: {0}")]
    Construction(#[from] rubato::ResamplerConstructionError),

    #[error("resampling failed: {0}")]
    Process(#[from] rubato::ResampleError),
}

/// Reasons a single file fails to process. None of these stop the batch.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("cannot decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("found {found} marker occurrence(s), need {required} (at {matches:?} s)")]
    InsufficientMatches {
        found: usize,
        required: usize,
        matches: Vec<f64>,
    },

    #[error(
        "gap window {index} is out of order: silence starts at {silence_start:.3} s, marker at {match_time:.3} s"
    )]
    InvalidGapOrdering {
        index: usize,
        silence_start: f64,
        match_time: f64,
    },

    #[error("cannot write {}: {source}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("cannot resample for analysis: {0}")]
    Resample(#[from] ResampleError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PipelineError {
    pub fn decode(path: impl Into<PathBuf>, source: CodecError) -> Self {
        Self::Decode {
            path: path.into(),
            source,
        }
    }

    pub fn encode(path: impl Into<PathBuf>, source: CodecError) -> Self {
        Self::Encode {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode { .. } => ErrorKind::Decode,
            Self::InsufficientMatches { .. } => ErrorKind::InsufficientMatches,
            Self::InvalidGapOrdering { .. } => ErrorKind::InvalidGapOrdering,
            Self::Encode { .. } => ErrorKind::Encode,
            Self::Resample(_) => ErrorKind::Resample,
            Self::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}

/// Error classification that survives the trip through a worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Decode,
    InsufficientMatches,
    InvalidGapOrdering,
    Encode,
    Resample,
    InvalidConfig,
    /// The unit panicked or its worker process died without a report.
    Crashed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_context() {
        let err = PipelineError::InsufficientMatches {
            found: 2,
            required: 6,
            matches: vec![1.5, 4.0],
        };
        assert_eq!(
            err.to_string(),
            "found 2 marker occurrence(s), need 6 (at [1.5, 4.0] s)"
        );
        assert_eq!(err.kind(), ErrorKind::InsufficientMatches);

        let err = PipelineError::decode("/tmp/a.mp3", CodecError::NoTrack);
        assert_eq!(err.to_string(), "cannot decode /tmp/a.mp3: no audio track found");
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn kinds_serialize_in_snake_case() {
        let json = serde_json::to_string(&ErrorKind::InvalidGapOrdering).unwrap();
        assert_eq!(json, "\"invalid_gap_ordering\"");
    }
}
