//! Locating a short reference clip inside a longer recording.

use std::borrow::Cow;

use tracing::debug;

use crate::{config::PipelineConfig, error::ResampleError, fft, waveform::Waveform};

const EPSILON: f32 = 1e-12;

/// Finds the times at which a reference clip recurs in a source recording.
#[derive(Debug, Clone)]
pub struct TemplateMatcher {
    threshold_ratio: f32,
    analysis_cap_secs: f64,
}

impl TemplateMatcher {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            threshold_ratio: config.threshold_ratio,
            analysis_cap_secs: config.analysis_cap_secs,
        }
    }

    /// Match times in seconds, ascending, at least one reference length apart
    /// and never past the analysis cap. A reference at another sample rate is
    /// resampled to the source's rate first.
    pub fn find(&self, source: &Waveform, reference: &Waveform) -> Result<Vec<f64>, ResampleError> {
        let rate = source.sample_rate();
        let reference = if reference.sample_rate() == rate {
            Cow::Borrowed(reference)
        } else {
            Cow::Owned(reference.resample(rate)?)
        };
        if rate == 0 || reference.is_empty() {
            return Ok(Vec::new());
        }

        let corr = normalized_correlation(source.head(self.analysis_cap_secs), reference.samples());
        let min_gap = reference.duration();

        let mut matches = Vec::new();
        let mut last = -min_gap;
        for (index, _) in corr
            .iter()
            .enumerate()
            .filter(|&(_, &c)| c >= self.threshold_ratio)
        {
            let t = index as f64 / rate as f64;
            if t - last >= min_gap && t <= self.analysis_cap_secs {
                matches.push(t);
                last = t;
            }
        }

        debug!(
            correlation_len = corr.len(),
            threshold = self.threshold_ratio,
            matches = ?matches,
            "Template matching complete"
        );
        Ok(matches)
    }
}

/// Rescales to zero mean and unit variance.
pub fn standardize(samples: &[f32]) -> Vec<f32> {
    if samples.is_empty() {
        return Vec::new();
    }
    let n = samples.len() as f64;
    let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
    let var = samples
        .iter()
        .map(|&x| (x as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    let scale = 1.0 / (var.sqrt() + EPSILON as f64);
    samples
        .iter()
        .map(|&x| ((x as f64 - mean) * scale) as f32)
        .collect()
}

/// Cross-correlation of the standardized signals over every full overlap,
/// scaled so its largest magnitude is 1.0. Index `k` scores the reference
/// aligned with `source[k..]`.
pub fn normalized_correlation(source: &[f32], reference: &[f32]) -> Vec<f32> {
    let source = standardize(source);
    let mut reversed = standardize(reference);
    reversed.reverse();

    let mut corr = fft::convolve_valid(&source, &reversed);
    let peak = corr.iter().fold(0.0f32, |a, &x| a.max(x.abs()));
    let scale = 1.0 / (peak + EPSILON);
    for x in corr.iter_mut() {
        *x *= scale;
    }
    corr
}
