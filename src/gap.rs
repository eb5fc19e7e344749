use tracing::{debug, warn};

use crate::{
    config::{PipelineConfig, REQUIRED_GAPS},
    error::{PipelineError, PipelineResult},
    matcher::TemplateMatcher,
    silence::SilenceLocator,
    waveform::Waveform,
};

/// A marker occurrence and the start of the silence leading into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapWindow {
    pub silence_start: f64,
    pub match_time: f64,
    /// False when no silence preceded the marker; `silence_start` then equals
    /// `match_time`.
    pub silence_found: bool,
}

impl GapWindow {
    pub fn new(silence_start: f64, match_time: f64) -> Self {
        Self {
            silence_start,
            match_time,
            silence_found: true,
        }
    }
}

pub struct GapDetector<'a> {
    config: &'a PipelineConfig,
}

impl<'a> GapDetector<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    /// Gap windows for the first [`REQUIRED_GAPS`] marker occurrences. Both
    /// waveforms should already be at the analysis rate.
    pub fn detect(&self, source: &Waveform, reference: &Waveform) -> PipelineResult<Vec<GapWindow>> {
        let matches = TemplateMatcher::new(self.config).find(source, reference)?;
        if matches.len() < REQUIRED_GAPS {
            return Err(PipelineError::InsufficientMatches {
                found: matches.len(),
                required: REQUIRED_GAPS,
                matches,
            });
        }

        let locator = SilenceLocator::new(source, self.config);
        let gaps: Vec<GapWindow> = matches
            .iter()
            .take(REQUIRED_GAPS)
            .map(|&match_time| {
                let silence = locator.locate_before(match_time);
                match silence.start {
                    Some(silence_start) => GapWindow::new(silence_start, match_time),
                    None => {
                        warn!(match_time, "No silence before marker, cutting at the marker");
                        GapWindow {
                            silence_start: match_time,
                            match_time,
                            silence_found: false,
                        }
                    }
                }
            })
            .collect();

        debug!(gaps = ?gaps, "Gap detection complete");
        Ok(gaps)
    }
}
