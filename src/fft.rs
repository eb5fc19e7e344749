use std::sync::Arc;

use rustfft::num_complex::Complex;

use crate::float::{from_usize, Float};

/// Planned forward/inverse transform pair of a fixed length.
pub struct Fft<T> {
    forward: Arc<dyn rustfft::Fft<T>>,
    inverse: Arc<dyn rustfft::Fft<T>>,
    len: usize,
}

impl<T: Float> Fft<T> {
    pub fn new(size: usize) -> Self {
        let mut planner = rustfft::FftPlanner::new();
        Self {
            forward: planner.plan_fft_forward(size),
            inverse: planner.plan_fft_inverse(size),
            len: size,
        }
    }

    pub fn forward(&self, buffer: &mut [Complex<T>]) {
        self.forward.process(buffer);
    }

    pub fn inverse(&self, buffer: &mut [Complex<T>]) {
        self.inverse.process(buffer);
    }

    /// Spectrum of a real buffer, zero padded (or cut) to the plan length.
    pub fn real_forward(&self, buf: &[T]) -> Vec<Complex<T>> {
        let mut spectrum: Vec<_> = buf
            .iter()
            .take(self.len)
            .map(|&x| Complex::new(x, T::zero()))
            .collect();
        spectrum.resize(self.len, Complex::new(T::zero(), T::zero()));
        self.forward(&mut spectrum);
        spectrum
    }

    /// Inverse transform keeping the real part, with the 1/N scale applied.
    pub fn real_inverse(&self, mut spectrum: Vec<Complex<T>>) -> Vec<T> {
        self.inverse(&mut spectrum);
        fix_scale(&mut spectrum);
        spectrum.into_iter().map(|x| x.re).collect()
    }
}

pub fn fix_scale<T: Float>(buf: &mut [Complex<T>]) {
    if buf.is_empty() {
        return;
    }
    let scale = T::one() / from_usize(buf.len());
    for x in buf.iter_mut() {
        *x = *x * scale;
    }
}

/// Mirrors bins `1..len/2` into the upper half so the inverse transform is real.
pub fn fill_right_part_of_spectrum<T: Float>(spectrum: &mut [Complex<T>]) {
    let len = spectrum.len();
    for i in 1..len / 2 {
        spectrum[len - i] = spectrum[i].conj();
    }
}

/// Linear convolution of `signal` with `kernel`, restricted to the positions
/// where the kernel fully overlaps the signal. The output has
/// `signal.len() - kernel.len() + 1` samples, or none when the kernel is empty
/// or longer than the signal.
pub fn convolve_valid<T: Float>(signal: &[T], kernel: &[T]) -> Vec<T> {
    let (n, m) = (signal.len(), kernel.len());
    if m == 0 || m > n {
        return Vec::new();
    }

    let full_len = n + m - 1;
    let fft = Fft::new(full_len.next_power_of_two());

    let mut spectrum = fft.real_forward(signal);
    let kernel_spectrum = fft.real_forward(kernel);
    for (x, k) in spectrum.iter_mut().zip(kernel_spectrum.iter()) {
        *x = *x * *k;
    }

    let full = fft.real_inverse(spectrum);
    full[m - 1..n].to_vec()
}
