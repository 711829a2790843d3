use reflex_core::attributes::{Attributes, names};
use reflex_core::{ClassifierParams, ConfigError, StimulusKind};
use serde::{Deserialize, Serialize};
use std::io::Read;

use super::trial::TrialSpec;

const INSTRUCTIONS: &str = "Press SPACE as soon as you see the square.";
const INSTRUCTIONS_DISTRACTOR: &str =
    "Press SPACE as soon as you see a white square. Ignore red squares.";
pub const FINISHED: &str = "FINISHED!";

/// Ranges used when positions are generated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionRange {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

/// A session file as it sits on disk: session attributes plus one attribute
/// set per trial, in presentation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionFile {
    #[serde(default)]
    pub session: Attributes,
    #[serde(default)]
    pub trials: Vec<Attributes>,
}

impl SessionFile {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn into_config(self) -> Result<SessionConfig, ConfigError> {
        SessionConfig::from_attributes(&self.session, &self.trials)
    }
}

/// Session-wide parameters and the declared trial sequence. Immutable once
/// loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    pub guess_time_limit: f64,
    pub response_time_limit: f64,
    /// Duration for trials that do not declare one.
    pub generated_duration: f64,
    pub random_positions: bool,
    pub include_distractor: bool,
    pub position_range: PositionRange,
    pub trials: Vec<TrialSpec>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            guess_time_limit: 0.0,
            response_time_limit: 0.0,
            generated_duration: 0.0,
            random_positions: false,
            include_distractor: false,
            position_range: PositionRange::default(),
            trials: Vec::new(),
        }
    }
}

fn non_negative(attrs: &Attributes, name: &'static str) -> Result<f64, ConfigError> {
    let value = attrs.number(name)?.unwrap_or(0.0);
    if value < 0.0 {
        return Err(ConfigError::Negative { name, value });
    }
    Ok(value)
}

/// Per-axis bound, falling back to the legacy single-range attribute.
fn bound(attrs: &Attributes, axis_name: &str, shared_name: &str) -> Result<f32, ConfigError> {
    let value = match attrs.number(axis_name)? {
        Some(v) => Some(v),
        None => attrs.number(shared_name)?,
    };
    Ok(value.unwrap_or(0.0) as f32)
}

impl SessionConfig {
    /// Builds and validates a session. Session-level attribute problems are
    /// fatal; per-trial problems fall back to defaults.
    pub fn from_attributes(
        session: &Attributes,
        trials: &[Attributes],
    ) -> Result<Self, ConfigError> {
        let position_range = PositionRange {
            min_x: bound(session, names::POSITION_RANGE_MIN_X, names::POSITION_RANGE_MIN)?,
            max_x: bound(session, names::POSITION_RANGE_MAX_X, names::POSITION_RANGE_MAX)?,
            min_y: bound(session, names::POSITION_RANGE_MIN_Y, names::POSITION_RANGE_MIN)?,
            max_y: bound(session, names::POSITION_RANGE_MAX_Y, names::POSITION_RANGE_MAX)?,
        };

        let config = Self {
            guess_time_limit: non_negative(session, names::GUESS_TIME_LIMIT)?,
            response_time_limit: non_negative(session, names::RESPONSE_TIME_LIMIT)?,
            generated_duration: non_negative(session, names::DURATION)?,
            random_positions: session.flag(names::RANDOM_POSITIONS)?.unwrap_or(false),
            include_distractor: session.flag(names::INCLUDE_DISTRACTOR)?.unwrap_or(false),
            position_range,
            trials: trials
                .iter()
                .enumerate()
                .map(|(index, attrs)| TrialSpec::from_attributes(index, attrs))
                .collect(),
        };

        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants that have no safe default.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            (names::GUESS_TIME_LIMIT, self.guess_time_limit),
            (names::RESPONSE_TIME_LIMIT, self.response_time_limit),
            (names::DURATION, self.generated_duration),
        ] {
            if value < 0.0 || !value.is_finite() {
                return Err(ConfigError::Negative { name, value });
            }
        }

        if self.random_positions {
            let r = &self.position_range;
            if r.min_x > r.max_x {
                return Err(ConfigError::InvertedRange {
                    axis: 'x',
                    min: r.min_x,
                    max: r.max_x,
                });
            }
            if r.min_y > r.max_y {
                return Err(ConfigError::InvertedRange {
                    axis: 'y',
                    min: r.min_y,
                    max: r.max_y,
                });
            }
        }

        let params = self.params();
        for (index, spec) in self.trials.iter().enumerate() {
            let kind = StimulusKind::from_flag(spec.is_distractor.unwrap_or(false));
            if self.include_distractor && kind.is_distractor() {
                continue;
            }
            let window = params.accuracy_window(spec.resolved_duration(self));
            if window == self.guess_time_limit {
                return Err(ConfigError::DegenerateWindow {
                    trial: index,
                    window,
                });
            }
        }

        Ok(())
    }

    pub fn params(&self) -> ClassifierParams {
        ClassifierParams::new(self.guess_time_limit, self.response_time_limit)
    }

    /// How long the input window stays open for a trial of `duration`. A
    /// trial without a duration falls back to the response time limit.
    pub fn input_window(&self, duration: f64) -> f64 {
        if duration > 0.0 {
            duration
        } else {
            self.response_time_limit
        }
    }

    pub fn instructions(&self) -> &'static str {
        if self.include_distractor {
            INSTRUCTIONS_DISTRACTOR
        } else {
            INSTRUCTIONS
        }
    }

    /// Session attributes in the same shape they are read.
    pub fn export(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.set(names::GUESS_TIME_LIMIT, self.guess_time_limit);
        attrs.set(names::RESPONSE_TIME_LIMIT, self.response_time_limit);
        attrs.set(names::DURATION, self.generated_duration);
        attrs.set(names::RANDOM_POSITIONS, self.random_positions);
        attrs.set(names::INCLUDE_DISTRACTOR, self.include_distractor);
        attrs.set(names::POSITION_RANGE_MIN_X, self.position_range.min_x);
        attrs.set(names::POSITION_RANGE_MAX_X, self.position_range.max_x);
        attrs.set(names::POSITION_RANGE_MIN_Y, self.position_range.min_y);
        attrs.set(names::POSITION_RANGE_MAX_Y, self.position_range.max_y);
        attrs
    }
}
