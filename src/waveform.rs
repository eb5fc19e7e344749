//! Mono sample buffers and the few edits the pipeline performs on them.

use std::time::Duration;

use rubato::{FftFixedIn, Resampler};

use crate::error::ResampleError;

/// Input frames per resampler call.
const RESAMPLE_CHUNK: usize = 1024;

/// Mono audio at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Down-mixes interleaved frames by averaging the channels.
    pub fn from_interleaved(interleaved: &[f32], channels: usize, sample_rate: u32) -> Self {
        let samples = match channels {
            0 | 1 => interleaved.to_vec(),
            n => interleaved
                .chunks_exact(n)
                .map(|frame| frame.iter().sum::<f32>() / n as f32)
                .collect(),
        };
        Self::new(samples, sample_rate)
    }

    pub fn silence(duration: Duration, sample_rate: u32) -> Self {
        let len = (duration.as_secs_f64() * sample_rate as f64).round() as usize;
        Self::new(vec![0.0; len], sample_rate)
    }

    /// Joins slices that share this sample rate.
    pub fn concat<'a>(parts: impl IntoIterator<Item = &'a [f32]>, sample_rate: u32) -> Self {
        let samples = parts.into_iter().flatten().copied().collect();
        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Nearest sample index for a time in seconds, clamped to the buffer.
    pub fn index_at(&self, seconds: f64) -> usize {
        let index = (seconds.max(0.0) * self.sample_rate as f64).round();
        (index as usize).min(self.samples.len())
    }

    /// Samples in `[start, end)` seconds. An inverted range is empty.
    pub fn slice(&self, start: f64, end: f64) -> &[f32] {
        let start = self.index_at(start);
        let end = self.index_at(end).max(start);
        &self.samples[start..end]
    }

    /// The first `seconds` of the buffer.
    pub fn head(&self, seconds: f64) -> &[f32] {
        self.slice(0.0, seconds)
    }

    /// Band-limited resampling. Content above the new Nyquist frequency is
    /// filtered out rather than folded back, and the result is aligned with
    /// the input and holds `round(len * new_rate / old_rate)` samples.
    pub fn resample(&self, sample_rate: u32) -> Result<Waveform, ResampleError> {
        if sample_rate == self.sample_rate {
            return Ok(self.clone());
        }
        if self.samples.is_empty() || self.sample_rate == 0 || sample_rate == 0 {
            return Ok(Waveform::new(Vec::new(), sample_rate));
        }

        let mut resampler = FftFixedIn::<f32>::new(
            self.sample_rate as usize,
            sample_rate as usize,
            RESAMPLE_CHUNK,
            2,
            1,
        )?;
        let delay = resampler.output_delay();
        let target_len = (self.samples.len() as f64 * sample_rate as f64 / self.sample_rate as f64)
            .round() as usize;

        let mut output = Vec::with_capacity(target_len + delay + RESAMPLE_CHUNK);
        let mut input = self.samples.as_slice();
        while input.len() >= resampler.input_frames_next() {
            let (chunk, rest) = input.split_at(resampler.input_frames_next());
            output.extend(resampler.process(&[chunk][..], None)?.swap_remove(0));
            input = rest;
        }
        if !input.is_empty() {
            output.extend(resampler.process_partial(Some(&[input][..]), None)?.swap_remove(0));
        }
        // Flush the filter tail until the delayed signal has fully come out.
        while output.len() < target_len + delay {
            let tail = resampler
                .process_partial(None::<&[&[f32]]>, None)?
                .swap_remove(0);
            if tail.is_empty() {
                break;
            }
            output.extend(tail);
        }

        output.drain(..delay.min(output.len()));
        output.resize(target_len, 0.0);
        Ok(Waveform::new(output, sample_rate))
    }

    /// Multiplies every sample by the linear factor for `db` decibels.
    pub fn with_gain_db(mut self, db: f32) -> Waveform {
        if db != 0.0 {
            let gain = 10f32.powf(db / 20.0);
            for x in self.samples.iter_mut() {
                *x *= gain;
            }
        }
        self
    }

    /// Pads with silence or cuts so the buffer holds exactly `len` samples.
    pub fn fit_to_len(mut self, len: usize) -> Waveform {
        self.samples.resize(len, 0.0);
        self
    }
}
