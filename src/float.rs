use rustfft::{num_traits, FftNum};

/// Sample type accepted by the FFT helpers.
pub trait Float: FftNum + num_traits::Float + num_traits::FloatConst + std::iter::Sum {}

impl<T: FftNum + num_traits::Float + num_traits::FloatConst + std::iter::Sum> Float for T {}

/// Lossless-enough conversion used where `usize` lengths meet sample math.
pub fn from_usize<T: Float>(x: usize) -> T {
    T::from(x).unwrap_or_else(T::max_value)
}
