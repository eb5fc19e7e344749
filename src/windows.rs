use crate::float::{from_usize, Float};

/// Periodic Hann window, the shape used for every analysis frame.
pub fn hann_window<T: Float>(size: usize) -> Vec<T> {
    let half = T::from(0.5).unwrap_or_else(T::one);
    (0..size)
        .map(|i| half * (T::one() - (from_usize::<T>(i) * T::TAU() / from_usize(size)).cos()))
        .collect()
}

pub fn apply_window<'a, T: Float>(
    window: &'a [T],
    buf: impl Iterator<Item = T> + 'a,
) -> impl Iterator<Item = T> + 'a {
    buf.zip(window.iter()).map(|(x, &w)| x * w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hann_is_periodic() {
        let w: Vec<f64> = hann_window(8);
        assert_eq!(w.len(), 8);
        assert!(w[0].abs() < 1e-12);
        assert!((w[4] - 1.0).abs() < 1e-12);
        assert!((w[2] - 0.5).abs() < 1e-12);
        assert!((w[1] - w[7]).abs() < 1e-12);
    }

    #[test]
    fn squared_hann_overlaps_to_a_constant_at_quarter_hop() {
        let size = 64;
        let hop = size / 4;
        let w: Vec<f64> = hann_window(size);
        for n in 0..hop {
            let sum: f64 = (0..4).map(|k| w[n + k * hop].powi(2)).sum();
            assert!((sum - 1.5).abs() < 1e-9);
        }
    }
}
