//! Frame-energy silence detection.

use crate::{config::PipelineConfig, stft::Stft, waveform::Waveform};

/// Levels below this amplitude are treated as this amplitude before taking
/// the logarithm.
const AMIN: f32 = 1e-5;
/// Quietest level reported, relative to the loudest frame.
const TOP_DB: f32 = 80.0;

/// A contiguous run of silent frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SilenceWindow {
    /// Start in seconds; `None` when no silence was found.
    pub start: Option<f64>,
    /// Length in seconds; zero when no silence was found.
    pub duration: f64,
}

impl SilenceWindow {
    pub fn absent() -> Self {
        Self {
            start: None,
            duration: 0.0,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.start.is_none()
    }

    pub fn end(&self) -> Option<f64> {
        self.start.map(|start| start + self.duration)
    }
}

/// Per-frame loudness of one recording, computed once and queried for any
/// number of target times.
#[derive(Debug, Clone)]
pub struct SilenceLocator {
    levels_db: Vec<f32>,
    hop_seconds: f64,
    threshold_db: f32,
}

impl SilenceLocator {
    pub fn new(waveform: &Waveform, config: &PipelineConfig) -> Self {
        let stft = Stft::new(config.frame_length, config.hop_length);
        // Levels come from the power spectrum, so -40 dB sits at a tenth of
        // the loudest frame's amplitude.
        let rms: Vec<f32> = stft
            .magnitudes(waveform.samples())
            .map(|frame| {
                let power: Vec<f32> = frame.iter().map(|m| m * m).collect();
                frame_rms(&power, config.frame_length)
            })
            .collect();

        Self {
            levels_db: amplitude_to_db(&rms),
            hop_seconds: config.hop_length as f64 / waveform.sample_rate().max(1) as f64,
            threshold_db: config.silence_threshold_db,
        }
    }

    pub fn frame_time(&self, frame: usize) -> f64 {
        frame as f64 * self.hop_seconds
    }

    pub fn is_silent(&self, frame: usize) -> bool {
        self.levels_db
            .get(frame)
            .is_some_and(|&db| db < self.threshold_db)
    }

    /// The last run of silent frames whose frames all start at or before
    /// `target` seconds. Silence after the target is never considered.
    pub fn locate_before(&self, target: f64) -> SilenceWindow {
        let candidates = (0..self.levels_db.len())
            .take_while(|&i| self.frame_time(i) <= target)
            .count();

        let Some(end) = (0..candidates).rev().find(|&i| self.is_silent(i)) else {
            return SilenceWindow::absent();
        };

        let mut start = end;
        while start > 0 && self.is_silent(start - 1) {
            start -= 1;
        }

        let start_time = self.frame_time(start);
        let end_time = self.frame_time(end) + self.hop_seconds;
        SilenceWindow {
            start: Some(start_time),
            duration: end_time - start_time,
        }
    }
}

/// Root-mean-square level of a frame from its one-sided spectrum. The DC bin,
/// and the Nyquist bin for even frame lengths, only count once.
pub fn frame_rms(magnitudes: &[f32], frame_length: usize) -> f32 {
    if magnitudes.is_empty() || frame_length == 0 {
        return 0.0;
    }
    let last = magnitudes.len() - 1;
    let energy: f64 = magnitudes
        .iter()
        .enumerate()
        .map(|(i, &m)| {
            let power = (m as f64).powi(2);
            if i == 0 || (i == last && frame_length % 2 == 0) {
                power * 0.5
            } else {
                power
            }
        })
        .sum();
    (2.0 * energy / (frame_length as f64).powi(2)).sqrt() as f32
}

/// Converts amplitudes to dB relative to the largest one, floored at -80 dB.
pub fn amplitude_to_db(levels: &[f32]) -> Vec<f32> {
    let peak = levels.iter().fold(0.0f32, |a, &x| a.max(x));
    let reference = 20.0 * peak.max(AMIN).log10();
    levels
        .iter()
        .map(|&x| (20.0 * x.max(AMIN).log10() - reference).max(-TOP_DB))
        .collect()
}
