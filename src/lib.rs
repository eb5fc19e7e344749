//! Finds a spoken marker in a recording and rebuilds the recording so that the
//! five segments between consecutive markers are each heard twice, then
//! stretches the result back to the original duration.

pub mod batch;
pub mod codec;
pub mod config;
pub mod error;
pub mod fft;
pub mod float;
pub mod gap;
pub mod matcher;
pub mod overlap_add;
pub mod pipeline;
pub mod pool;
pub mod reconstruct;
pub mod silence;
pub mod stft;
pub mod stretch;
pub mod trim;
pub mod waveform;
pub mod windows;

pub use codec::{AudioCodec, FileCodec, OutputFormat};
pub use config::{PipelineConfig, TrimConfig, REQUIRED_GAPS};
pub use error::{CodecError, ErrorKind, PipelineError, PipelineResult, ResampleError};
pub use gap::{GapDetector, GapWindow};
pub use pipeline::{repeat_segments, Job, RepeatJob, TrimJob};
pub use waveform::Waveform;
