//! Pitch-preserving time stretching.

use rustfft::num_complex::Complex;
use tracing::debug;

use crate::{
    config::PipelineConfig,
    fft::{fill_right_part_of_spectrum, Fft},
    float::Float,
    overlap_add::OverlapAddExt,
    waveform::Waveform,
    windows,
};

/// Phase vocoder with a fixed synthesis hop of a quarter window.
///
/// Frames are read from the input every `rate * synthesis_hop` samples and
/// written every `synthesis_hop` samples, so a rate above 1 shortens the
/// signal. Each bin's phase advances by its measured instantaneous frequency,
/// which keeps partials coherent across frames.
pub struct PhaseVocoder {
    window_size: usize,
    synthesis_hop: usize,
    window: Vec<f32>,
    fft: Fft<f32>,
    prev_input_phases: Vec<f32>,
    output_phases: Vec<f32>,
    primed: bool,
}

impl PhaseVocoder {
    pub fn new(window_size: usize) -> Self {
        Self {
            window_size,
            synthesis_hop: (window_size / 4).max(1),
            window: windows::hann_window(window_size),
            fft: Fft::new(window_size),
            prev_input_phases: vec![0.0; window_size],
            output_phases: vec![0.0; window_size],
            primed: false,
        }
    }

    /// Stretches `input` by `1 / rate` and returns exactly `output_len` samples.
    pub fn stretch(&mut self, input: &[f32], rate: f64, output_len: usize) -> Vec<f32> {
        let half = self.window_size / 2;
        let hop = self.synthesis_hop;

        // Centre the first frame on the first sample.
        let mut padded = vec![0.0; half];
        padded.extend_from_slice(input);

        let frame_count = (output_len + self.window_size) / hop + 1;
        let positions: Vec<usize> = (0..frame_count)
            .map(|k| (k as f64 * hop as f64 * rate).round() as usize)
            .collect();

        let output_scale = hop as f32 / self.window.iter().map(|w| w * w).sum::<f32>();
        self.primed = false;

        let frames = positions.iter().enumerate().map(|(k, &start)| {
            let advance = if k == 0 { 0 } else { start - positions[k - 1] };
            let mut frame = vec![0.0; self.window_size];
            if start < padded.len() {
                let end = (start + self.window_size).min(padded.len());
                frame[..end - start].copy_from_slice(&padded[start..end]);
            }
            let mut frame = self.process_frame(&frame, advance);
            for (x, w) in frame.iter_mut().zip(self.window.iter()) {
                *x *= w * output_scale;
            }
            frame
        });

        let mut output: Vec<f32> = frames.overlap_add(hop).skip(half).take(output_len).collect();

        // The first frames have no predecessors, so fewer windows overlap there.
        let steady = 1.0 / output_scale;
        for (j, x) in output.iter_mut().enumerate().take(self.window_size - half) {
            let p = j + half;
            let overlap: f32 = (0..=p / hop)
                .map(|k| p - k * hop)
                .filter(|&m| m < self.window_size)
                .map(|m| self.window[m].powi(2))
                .sum();
            if overlap > 1e-3 {
                *x *= steady / overlap;
            }
        }
        output
    }

    fn process_frame(&mut self, frame: &[f32], analysis_hop: usize) -> Vec<f32> {
        let windowed: Vec<f32> = windows::apply_window(&self.window, frame.iter().copied()).collect();
        let mut spectrum = self.fft.real_forward(&windowed);

        let len = self.window_size;
        let synthesis_hop = self.synthesis_hop as f32;
        for i in 0..len / 2 + 1 {
            let (norm, input_phase) = spectrum[i].to_polar();
            let bin_center_freq = std::f32::consts::TAU * i as f32 / len as f32;

            let phase = if !self.primed {
                input_phase
            } else {
                let freq = if analysis_hop == 0 {
                    bin_center_freq
                } else {
                    let hop = analysis_hop as f32;
                    let deviation = wrap_phase(
                        input_phase - self.prev_input_phases[i] - bin_center_freq * hop,
                    );
                    bin_center_freq + deviation / hop
                };
                wrap_phase(self.output_phases[i] + freq * synthesis_hop)
            };

            self.prev_input_phases[i] = input_phase;
            self.output_phases[i] = phase;
            spectrum[i] = Complex::from_polar(norm, phase);
        }
        self.primed = true;

        fill_right_part_of_spectrum(&mut spectrum);
        self.fft.real_inverse(spectrum)
    }
}

pub fn wrap_phase<T: Float>(phase: T) -> T {
    if phase >= T::zero() {
        (phase + T::PI()) % T::TAU() - T::PI()
    } else {
        (phase - T::PI()) % T::TAU() + T::PI()
    }
}

/// Brings a rebuilt recording back to the length of the original.
#[derive(Debug, Clone)]
pub struct DurationNormalizer {
    window_size: usize,
}

impl DurationNormalizer {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            window_size: config.stretch_window,
        }
    }

    /// Time-stretches `waveform` to last `target` seconds at its own sample
    /// rate. The result has exactly `round(target * sample_rate)` samples.
    pub fn normalize(&self, waveform: &Waveform, target: f64) -> Waveform {
        let sample_rate = waveform.sample_rate();
        let target_len = (target.max(0.0) * sample_rate as f64).round() as usize;
        let rate = waveform.duration() / target;

        if waveform.is_empty() || target_len == 0 || !rate.is_finite() || rate <= 0.0 {
            return Waveform::new(vec![0.0; target_len], sample_rate);
        }

        let output = PhaseVocoder::new(self.window_size).stretch(waveform.samples(), rate, target_len);
        debug!(
            rate,
            input_len = waveform.len(),
            output_len = output.len(),
            "Duration normalized"
        );
        Waveform::new(output, sample_rate).fit_to_len(target_len)
    }
}
