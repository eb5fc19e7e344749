use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

pub const RATE: u32 = 8000;

/// Deterministic uniform noise in `[-amplitude, amplitude)`.
pub fn noise(len: usize, seed: u64, amplitude: f32) -> Vec<f32> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let unit = (state >> 40) as f32 / (1u64 << 24) as f32;
            amplitude * (2.0 * unit - 1.0)
        })
        .collect()
}

/// Noise with `marker` at each of `times`, each preceded by half a second of
/// silence.
pub fn exam_recording(duration_secs: f64, marker: &[f32], times: &[f64]) -> Vec<f32> {
    let len = (duration_secs * RATE as f64) as usize;
    let mut samples = noise(len, 99, 0.2);
    for &t in times {
        let at = (t * RATE as f64) as usize;
        samples[at - RATE as usize / 2..at].fill(0.0);
        samples[at..at + marker.len()].copy_from_slice(marker);
    }
    samples
}

pub fn write_wav(path: &Path, samples: &[f32]) {
    let spec = WavSpec {
        channels: 1,
        sample_rate: RATE,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(path, spec).unwrap();
    for &x in samples {
        writer.write_sample(x).unwrap();
    }
    writer.finalize().unwrap();
}
