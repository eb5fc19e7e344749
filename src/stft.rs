use crate::{fft::Fft, windows};

/// Centered short-time Fourier analysis: the signal is zero padded by half a
/// frame on both sides, so frame `i` is centered on sample `i * hop_length`.
pub struct Stft {
    frame_length: usize,
    hop_length: usize,
    window: Vec<f32>,
    fft: Fft<f32>,
}

impl Stft {
    pub fn new(frame_length: usize, hop_length: usize) -> Self {
        Self {
            frame_length,
            hop_length: hop_length.max(1),
            window: windows::hann_window(frame_length),
            fft: Fft::new(frame_length),
        }
    }

    pub fn frame_count(&self, signal_len: usize) -> usize {
        let padded = signal_len + 2 * (self.frame_length / 2);
        if padded < self.frame_length || self.frame_length == 0 {
            return 0;
        }
        (padded - self.frame_length) / self.hop_length + 1
    }

    /// Magnitudes of bins `0..=frame_length / 2` for every frame.
    pub fn magnitudes<'a>(&'a self, signal: &[f32]) -> impl Iterator<Item = Vec<f32>> + 'a {
        let pad = self.frame_length / 2;
        let mut padded = vec![0.0; pad];
        padded.extend_from_slice(signal);
        padded.resize(padded.len() + pad, 0.0);

        let count = self.frame_count(signal.len());
        let bins = self.frame_length / 2 + 1;

        (0..count).map(move |i| {
            let start = i * self.hop_length;
            let frame = &padded[start..start + self.frame_length];
            let windowed: Vec<f32> =
                windows::apply_window(&self.window, frame.iter().copied()).collect();
            self.fft
                .real_forward(&windowed)
                .iter()
                .take(bins)
                .map(|x| x.norm())
                .collect()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_follows_centered_layout() {
        let stft = Stft::new(2048, 512);
        assert_eq!(stft.frame_count(22050), 1 + 22050 / 512);
        assert_eq!(stft.frame_count(0), 1);
    }

    #[test]
    fn sine_peaks_in_its_bin() {
        let (n, rate) = (256, 8000.0f32);
        let bin = 16;
        let freq = bin as f32 * rate / n as f32;
        let signal: Vec<f32> = (0..4000)
            .map(|i| (std::f32::consts::TAU * freq * i as f32 / rate).sin())
            .collect();

        let stft = Stft::new(n, n / 4);
        let frames: Vec<_> = stft.magnitudes(&signal).collect();
        assert_eq!(frames.len(), stft.frame_count(signal.len()));

        let middle = &frames[frames.len() / 2];
        assert_eq!(middle.len(), n / 2 + 1);
        let peak = middle
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(bin));
    }
}
