use crate::{config::TrimConfig, waveform::Waveform};

/// Keeps `[trim_start, trim_end)` and applies the configured gain.
///
/// `trim_end` only takes effect when it lies after `trim_start` and within the
/// recording; otherwise everything from `trim_start` on is kept.
pub fn trim_and_gain(waveform: &Waveform, config: &TrimConfig) -> Waveform {
    let duration = waveform.duration();
    let start = config.trim_start.max(0.0);
    let end = if start < config.trim_end && config.trim_end <= duration {
        config.trim_end
    } else {
        duration
    };

    Waveform::new(waveform.slice(start, end).to_vec(), waveform.sample_rate())
        .with_gain_db(config.gain_db)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Waveform {
        Waveform::new((0..1000).map(|i| i as f32 / 1000.0).collect(), 100)
    }

    #[test]
    fn keeps_the_requested_range() {
        let config = TrimConfig {
            trim_start: 1.0,
            trim_end: 3.0,
            gain_db: 0.0,
        };
        let out = trim_and_gain(&ramp(), &config);
        assert_eq!(out.len(), 200);
        assert_eq!(out.samples()[0], 0.1);
    }

    #[test]
    fn end_outside_the_recording_keeps_the_rest() {
        for trim_end in [0.0, 0.5, 20.0] {
            let config = TrimConfig {
                trim_start: 1.0,
                trim_end,
                gain_db: 0.0,
            };
            assert_eq!(trim_and_gain(&ramp(), &config).len(), 900, "trim_end {trim_end}");
        }
    }

    #[test]
    fn default_config_is_a_no_op() {
        let out = trim_and_gain(&ramp(), &TrimConfig::default());
        assert_eq!(out, ramp());
    }

    #[test]
    fn applies_gain() {
        let config = TrimConfig {
            gain_db: -6.0,
            ..TrimConfig::default()
        };
        let out = trim_and_gain(&ramp(), &config);
        let expected = 0.5 * 10f32.powf(-6.0 / 20.0);
        assert!((out.samples()[500] - expected).abs() < 1e-6);
    }
}
