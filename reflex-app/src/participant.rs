use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use reflex_core::StimulusKind;

fn probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}

/// A scripted stand-in for a human, used by `reflex simulate`.
pub struct Participant {
    rng: StdRng,
    reaction_range: (f64, f64),
    miss_rate: f64,
    false_alarm_rate: f64,
}

impl Participant {
    pub fn new(seed: u64, reaction_range: (f64, f64), miss_rate: f64, false_alarm_rate: f64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            reaction_range,
            miss_rate: probability(miss_rate),
            false_alarm_rate: probability(false_alarm_rate),
        }
    }

    /// Seconds after onset at which this participant presses, if at all.
    pub fn plan(&mut self, kind: StimulusKind) -> Option<f64> {
        let responds = match kind {
            StimulusKind::Normal => !self.rng.random_bool(self.miss_rate),
            StimulusKind::Distractor => self.rng.random_bool(self.false_alarm_rate),
        };
        responds.then(|| self.reaction_time())
    }

    fn reaction_time(&mut self) -> f64 {
        let (min, max) = self.reaction_range;
        let rt = if min < max && min.is_finite() && max.is_finite() {
            self.rng.random_range(min..max)
        } else {
            min
        };
        // A zero reaction time would read as "no response".
        rt.max(1e-3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_misses_at_zero_rates() {
        let mut p = Participant::new(1, (0.2, 0.4), 0.0, 0.0);
        for _ in 0..100 {
            let rt = p.plan(StimulusKind::Normal).expect("always responds");
            assert!((0.2..0.4).contains(&rt));
            assert_eq!(p.plan(StimulusKind::Distractor), None);
        }
    }

    #[test]
    fn always_falls_for_distractors_at_full_rate() {
        let mut p = Participant::new(2, (0.3, 0.3), 1.0, 1.0);
        assert_eq!(p.plan(StimulusKind::Distractor), Some(0.3));
        assert_eq!(p.plan(StimulusKind::Normal), None);
    }
}
