use rand::Rng;
use reflex_core::attributes::{Attributes, names};
use reflex_core::{StimulusKind, Trial};

use super::config::SessionConfig;

/// Trial fields as declared in the session file. Anything absent is derived
/// when the trial is resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialSpec {
    pub delay: Option<f64>,
    pub duration: Option<f64>,
    pub position_x: Option<f32>,
    pub position_y: Option<f32>,
    pub is_distractor: Option<bool>,
}

/// Timer readings collected while a trial runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrialTimestamps<T> {
    pub start: T,
    pub stimulus_start: Option<T>,
}

fn recover_number(index: usize, attrs: &Attributes, name: &str) -> Option<f64> {
    match attrs.number(name) {
        Ok(Some(value)) if value < 0.0 => {
            tracing::warn!(trial = index, attribute = name, value, "negative value ignored");
            None
        }
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(trial = index, "{err}, using default");
            None
        }
    }
}

fn recover_coordinate(index: usize, attrs: &Attributes, name: &str) -> Option<f32> {
    match attrs.number(name) {
        Ok(value) => value.map(|v| v as f32),
        Err(err) => {
            tracing::warn!(trial = index, "{err}, using default");
            None
        }
    }
}

/// Draws from `[min, max)`; an empty range collapses to `min`.
fn sample<R: Rng>(rng: &mut R, min: f32, max: f32) -> f32 {
    if min < max {
        rng.random_range(min..max)
    } else {
        min
    }
}

impl TrialSpec {
    /// Reads the declared trial fields. A malformed attribute is logged and
    /// treated as absent so the trial still runs with its default.
    pub fn from_attributes(index: usize, attrs: &Attributes) -> Self {
        Self {
            delay: recover_number(index, attrs, names::DELAY),
            duration: recover_number(index, attrs, names::DURATION),
            position_x: recover_coordinate(index, attrs, names::POSITION_X),
            position_y: recover_coordinate(index, attrs, names::POSITION_Y),
            is_distractor: match attrs.flag(names::IS_DISTRACTOR) {
                Ok(flag) => flag,
                Err(err) => {
                    tracing::warn!(trial = index, "{err}, using default");
                    None
                }
            },
        }
    }

    pub fn resolved_duration(&self, session: &SessionConfig) -> f64 {
        self.duration.unwrap_or(session.generated_duration)
    }

    /// Fills in every derived field. Only random positions consume `rng`.
    pub fn resolve<R: Rng>(
        &self,
        index: usize,
        session: &SessionConfig,
        rng: &mut R,
    ) -> Trial {
        let position = if session.random_positions {
            let range = &session.position_range;
            let x = sample(rng, range.min_x, range.max_x);
            let y = sample(rng, range.min_y, range.max_y);
            (x, y)
        } else {
            (
                self.position_x.unwrap_or(0.0),
                self.position_y.unwrap_or(0.0),
            )
        };

        Trial {
            index,
            delay: self.delay.unwrap_or(0.0),
            duration: self.resolved_duration(session),
            position,
            kind: StimulusKind::from_flag(self.is_distractor.unwrap_or(false)),
        }
    }
}
