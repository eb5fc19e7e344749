//! Cutting a recording at its gap windows and splicing in the repeats.

use std::time::Duration;

use tracing::debug;

use crate::{
    config::{PipelineConfig, REQUIRED_GAPS},
    error::{PipelineError, PipelineResult},
    gap::GapWindow,
    waveform::Waveform,
};

/// Number of repeat/listening pairs between the lead and trailing parts.
pub const REPEATED_SEGMENTS: usize = REQUIRED_GAPS - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRole {
    Lead,
    Repeat(usize),
    Listening(usize),
    Trailing,
}

#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    pub role: SegmentRole,
    pub samples: &'a [f32],
}

/// The twelve slices of a recording, in source order: lead, then each repeat
/// followed by its listening part, then trailing.
#[derive(Debug)]
pub struct SegmentPlan<'a> {
    segments: Vec<Segment<'a>>,
    sample_rate: u32,
}

impl<'a> SegmentPlan<'a> {
    pub fn new(waveform: &'a Waveform, gaps: &[GapWindow]) -> PipelineResult<Self> {
        check_gaps(waveform, gaps)?;

        let at = |t: f64| waveform.index_at(t);
        let samples = waveform.samples();

        let mut segments = Vec::with_capacity(2 * REQUIRED_GAPS);
        segments.push(Segment {
            role: SegmentRole::Lead,
            samples: &samples[..at(gaps[0].match_time)],
        });
        for i in 0..REPEATED_SEGMENTS {
            let (current, next) = (&gaps[i], &gaps[i + 1]);
            segments.push(Segment {
                role: SegmentRole::Repeat(i),
                samples: &samples[at(current.match_time)..at(next.silence_start)],
            });
            segments.push(Segment {
                role: SegmentRole::Listening(i),
                samples: &samples[at(next.silence_start)..at(next.match_time)],
            });
        }
        segments.push(Segment {
            role: SegmentRole::Trailing,
            samples: &samples[at(gaps[REQUIRED_GAPS - 1].match_time)..],
        });

        Ok(Self {
            segments,
            sample_rate: waveform.sample_rate(),
        })
    }

    pub fn segments(&self) -> &[Segment<'a>] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total(&self, pick: impl Fn(SegmentRole) -> bool) -> usize {
        self.segments
            .iter()
            .filter(|s| pick(s.role))
            .map(|s| s.samples.len())
            .sum()
    }

    /// Length of the rebuilt recording when `silence_len` samples separate the
    /// two copies of each repeat.
    pub fn output_len(&self, silence_len: usize) -> usize {
        let repeats = self.total(|r| matches!(r, SegmentRole::Repeat(_)));
        let listening = self.total(|r| matches!(r, SegmentRole::Listening(_)));
        let ends = self.total(|r| matches!(r, SegmentRole::Lead | SegmentRole::Trailing));
        ends + 2 * repeats + REPEATED_SEGMENTS * silence_len + listening
    }
}

fn check_gaps(waveform: &Waveform, gaps: &[GapWindow]) -> PipelineResult<()> {
    if gaps.len() != REQUIRED_GAPS {
        return Err(PipelineError::InsufficientMatches {
            found: gaps.len(),
            required: REQUIRED_GAPS,
            matches: gaps.iter().map(|g| g.match_time).collect(),
        });
    }

    let duration = waveform.duration();
    let out_of_order = |index: usize| {
        let gap = gaps[index];
        PipelineError::InvalidGapOrdering {
            index,
            silence_start: gap.silence_start,
            match_time: gap.match_time,
        }
    };

    for (index, gap) in gaps.iter().enumerate() {
        let in_range = (0.0..=duration).contains(&gap.silence_start)
            && (0.0..=duration).contains(&gap.match_time);
        if !in_range || gap.silence_start > gap.match_time {
            return Err(out_of_order(index));
        }
        if index > 0 && gaps[index - 1].match_time > gap.silence_start {
            return Err(out_of_order(index));
        }
    }
    Ok(())
}

/// Rebuilds a recording so every inner segment plays twice.
#[derive(Debug, Clone)]
pub struct SegmentReconstructor {
    repeat_silence: Duration,
}

impl SegmentReconstructor {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            repeat_silence: config.repeat_silence(),
        }
    }

    pub fn reconstruct(&self, waveform: &Waveform, gaps: &[GapWindow]) -> PipelineResult<Waveform> {
        let plan = SegmentPlan::new(waveform, gaps)?;
        Ok(self.assemble(plan))
    }

    /// lead, (repeat, silence, repeat, listening) for each pair, trailing.
    pub fn assemble(&self, plan: SegmentPlan<'_>) -> Waveform {
        let silence = Waveform::silence(self.repeat_silence, plan.sample_rate());
        let expected = plan.output_len(silence.len());

        let mut parts: Vec<&[f32]> = Vec::with_capacity(4 * REPEATED_SEGMENTS + 2);
        for segment in plan.segments() {
            match segment.role {
                SegmentRole::Repeat(_) => {
                    parts.extend([segment.samples, silence.samples(), segment.samples])
                }
                _ => parts.push(segment.samples),
            }
        }

        let output = Waveform::concat(parts, plan.sample_rate());
        debug!(
            segments = plan.len(),
            input_len = plan.segments().iter().map(|s| s.samples.len()).sum::<usize>(),
            output_len = output.len(),
            "Reconstruction complete"
        );
        debug_assert_eq!(output.len(), expected);
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 100;

    fn ramp(seconds: usize) -> Waveform {
        Waveform::new((0..seconds * RATE as usize).map(|i| i as f32).collect(), RATE)
    }

    fn gaps() -> Vec<GapWindow> {
        [(1.5, 2.0), (4.0, 5.0), (7.5, 8.0), (10.0, 11.0), (13.0, 14.0), (16.5, 17.0)]
            .into_iter()
            .map(|(s, m)| GapWindow::new(s, m))
            .collect()
    }

    #[test]
    fn plans_twelve_slices_in_order() {
        let wf = ramp(20);
        let plan = SegmentPlan::new(&wf, &gaps()).unwrap();
        assert_eq!(plan.len(), 12);

        let roles: Vec<_> = plan.segments().iter().map(|s| s.role).collect();
        assert_eq!(roles[0], SegmentRole::Lead);
        assert_eq!(roles[1], SegmentRole::Repeat(0));
        assert_eq!(roles[2], SegmentRole::Listening(0));
        assert_eq!(roles[9], SegmentRole::Repeat(4));
        assert_eq!(roles[10], SegmentRole::Listening(4));
        assert_eq!(roles[11], SegmentRole::Trailing);

        let lens: Vec<_> = plan.segments().iter().map(|s| s.samples.len()).collect();
        assert_eq!(lens, vec![200, 200, 100, 250, 50, 200, 100, 200, 100, 250, 50, 300]);
        // Slices tile the recording.
        assert_eq!(lens.iter().sum::<usize>(), wf.len());
    }

    #[test]
    fn output_length_matches_closed_form() {
        let wf = ramp(20);
        let config = PipelineConfig::default().with_repeat_silence_ms(2000);
        let out = SegmentReconstructor::new(&config).reconstruct(&wf, &gaps()).unwrap();

        let repeats = 200 + 250 + 200 + 200 + 250;
        let listening = 100 + 50 + 100 + 100 + 50;
        let expected = 200 + 300 + 2 * repeats + 5 * 200 + listening;
        assert_eq!(out.len(), expected);
        assert_eq!(out.sample_rate(), RATE);
    }

    #[test]
    fn splices_repeat_silence_repeat_listening() {
        let wf = ramp(20);
        let config = PipelineConfig::default().with_repeat_silence_ms(100);
        let out = SegmentReconstructor::new(&config).reconstruct(&wf, &gaps()).unwrap();
        let s = out.samples();

        // lead
        assert_eq!(&s[..200], &wf.samples()[..200]);
        // first repeat, ten samples of silence, the repeat again, its listening part
        assert_eq!(&s[200..400], &wf.samples()[200..400]);
        assert!(s[400..410].iter().all(|&x| x == 0.0));
        assert_eq!(&s[410..610], &wf.samples()[200..400]);
        assert_eq!(&s[610..710], &wf.samples()[400..500]);
        // second repeat starts at the second marker
        assert_eq!(s[710], 500.0);
        // trailing part closes the recording
        assert_eq!(&s[s.len() - 300..], &wf.samples()[1700..]);
    }

    #[test]
    fn wrong_window_count_is_rejected() {
        let wf = ramp(20);
        let err = SegmentPlan::new(&wf, &gaps()[..5]).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientMatches { found: 5, required: 6, .. }
        ));
    }

    #[test]
    fn silence_after_marker_is_rejected() {
        let wf = ramp(20);
        let mut gaps = gaps();
        gaps[3] = GapWindow::new(11.5, 11.0);
        let err = SegmentPlan::new(&wf, &gaps).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidGapOrdering { index: 3, .. }));
    }

    #[test]
    fn silence_before_previous_marker_is_rejected() {
        let wf = ramp(20);
        let mut gaps = gaps();
        gaps[2] = GapWindow::new(4.5, 8.0);
        let err = SegmentPlan::new(&wf, &gaps).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InvalidGapOrdering { index: 2, silence_start, match_time }
                if silence_start == 4.5 && match_time == 8.0
        ));
    }

    #[test]
    fn marker_past_the_end_is_rejected() {
        let wf = ramp(10);
        let err = SegmentPlan::new(&wf, &gaps()).unwrap_err();
        assert!(matches!(err, PipelineError::InvalidGapOrdering { index: 3, .. }));
    }

    #[test]
    fn absent_silence_gives_empty_listening_part() {
        let wf = ramp(20);
        let mut gaps = gaps();
        gaps[1] = GapWindow {
            silence_start: 5.0,
            match_time: 5.0,
            silence_found: false,
        };
        let plan = SegmentPlan::new(&wf, &gaps).unwrap();
        assert_eq!(plan.segments()[1].samples.len(), 300);
        assert!(plan.segments()[2].samples.is_empty());
    }
}
