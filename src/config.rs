//! Parameters for the repeat and trim pipelines.
//!
//! Every stage receives its settings from one of these values; nothing reads
//! global defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// Number of marker occurrences a recording must contain. The segment layout
/// (one lead, five repeat/listening pairs, one trailing part) follows from it.
pub const REQUIRED_GAPS: usize = 6;

/// Settings for locating markers and rebuilding a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sample rate both recordings are resampled to before analysis.
    pub analysis_rate: u32,

    /// Minimum normalized correlation (0.0-1.0] for a position to count as a
    /// marker occurrence.
    pub threshold_ratio: f32,

    /// Only the first `analysis_cap_secs` seconds are searched for markers.
    pub analysis_cap_secs: f64,

    /// Frames quieter than this, relative to the loudest frame, are silent.
    pub silence_threshold_db: f32,

    /// STFT frame length in samples for silence detection.
    pub frame_length: usize,

    /// STFT hop in samples for silence detection.
    pub hop_length: usize,

    /// Silence inserted between the two copies of each repeated segment.
    pub repeat_silence_ms: u64,

    /// Phase vocoder window length in samples.
    pub stretch_window: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analysis_rate: 22050,
            threshold_ratio: 0.8,
            analysis_cap_secs: 300.0,
            silence_threshold_db: -40.0,
            frame_length: 2048,
            hop_length: 1024,
            repeat_silence_ms: 2000,
            stretch_window: 2048,
        }
    }
}

impl PipelineConfig {
    pub fn with_analysis_rate(mut self, rate: u32) -> Self {
        self.analysis_rate = rate;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold_ratio = threshold;
        self
    }

    pub fn with_analysis_cap_secs(mut self, secs: f64) -> Self {
        self.analysis_cap_secs = secs;
        self
    }

    pub fn with_silence_threshold_db(mut self, db: f32) -> Self {
        self.silence_threshold_db = db;
        self
    }

    pub fn with_frames(mut self, frame_length: usize, hop_length: usize) -> Self {
        self.frame_length = frame_length;
        self.hop_length = hop_length;
        self
    }

    pub fn with_repeat_silence_ms(mut self, ms: u64) -> Self {
        self.repeat_silence_ms = ms;
        self
    }

    pub fn with_stretch_window(mut self, window: usize) -> Self {
        self.stretch_window = window;
        self
    }

    pub fn repeat_silence(&self) -> Duration {
        Duration::from_millis(self.repeat_silence_ms)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if !(self.threshold_ratio > 0.0 && self.threshold_ratio <= 1.0) {
            return invalid(format!(
                "threshold ratio must be in (0, 1], got {}",
                self.threshold_ratio
            ));
        }
        if self.analysis_rate == 0 {
            return invalid("analysis rate must be positive".into());
        }
        if !(self.analysis_cap_secs > 0.0) {
            return invalid(format!(
                "analysis cap must be positive, got {}",
                self.analysis_cap_secs
            ));
        }
        if self.frame_length == 0 || self.hop_length == 0 || self.hop_length > self.frame_length {
            return invalid(format!(
                "need 0 < hop ({}) <= frame length ({})",
                self.hop_length, self.frame_length
            ));
        }
        if self.stretch_window < 4 {
            return invalid(format!(
                "stretch window must be at least 4 samples, got {}",
                self.stretch_window
            ));
        }
        Ok(())
    }
}

/// Settings for the plain trim/gain path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrimConfig {
    /// Start of the kept region in seconds.
    pub trim_start: f64,
    /// End of the kept region in seconds; ignored unless it lies after
    /// `trim_start` and within the recording.
    pub trim_end: f64,
    /// Gain applied after trimming, in dB.
    pub gain_db: f32,
}
