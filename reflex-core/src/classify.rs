//! Response classification.
//!
//! Maps a response time (seconds since the input window opened, `0.0` for
//! no response) to an [`Outcome`] and an accuracy score. Everything here is
//! pure; the sequencer decides which [`StimulusKind`] a trial counts as.

use serde::{Deserialize, Serialize};

use crate::error::ClassifyError;
use crate::stimulus::StimulusKind;
use crate::trial::Outcome;

/// Session-wide timing limits that drive classification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifierParams {
    /// Responses faster than this count as guesses. `0` disables the check.
    pub guess_time_limit: f64,
    /// Responses at or beyond this are too slow. `0` means no upper bound.
    pub response_time_limit: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub outcome: Outcome,
    pub success: bool,
    pub accuracy: f64,
}

impl Classification {
    fn failure(outcome: Outcome) -> Self {
        Self {
            outcome,
            success: false,
            accuracy: 0.0,
        }
    }
}

pub fn is_no_response(response_time: f64) -> bool {
    response_time == 0.0
}

impl ClassifierParams {
    pub fn new(guess_time_limit: f64, response_time_limit: f64) -> Self {
        Self {
            guess_time_limit,
            response_time_limit,
        }
    }

    pub fn has_response_time_limit(&self) -> bool {
        self.response_time_limit > 0.0
    }

    pub fn is_guess(&self, response_time: f64) -> bool {
        self.guess_time_limit > 0.0 && response_time < self.guess_time_limit
    }

    pub fn is_valid(&self, response_time: f64) -> bool {
        self.response_time_limit <= 0.0 || response_time < self.response_time_limit
    }

    /// The span accuracy is measured against: the response time limit when
    /// there is one, otherwise the trial duration.
    pub fn accuracy_window(&self, duration: f64) -> f64 {
        if self.has_response_time_limit() {
            self.response_time_limit
        } else {
            duration
        }
    }

    /// `1` for a response right at the guess limit, falling linearly to `0`
    /// at the end of the accuracy window.
    pub fn accuracy(&self, duration: f64, response_time: f64) -> Result<f64, ClassifyError> {
        let window = self.accuracy_window(duration);
        let span = window - self.guess_time_limit;
        if span == 0.0 || !span.is_finite() {
            return Err(ClassifyError::DegenerateWindow {
                window,
                guess_time_limit: self.guess_time_limit,
            });
        }
        Ok(1.0 - (response_time - self.guess_time_limit) / span)
    }

    pub fn classify(
        &self,
        duration: f64,
        kind: StimulusKind,
        response_time: f64,
    ) -> Result<Classification, ClassifyError> {
        let responded = !is_no_response(response_time);

        let classification = match (kind, responded) {
            (StimulusKind::Distractor, false) => Classification {
                outcome: Outcome::Correct,
                success: true,
                accuracy: 1.0,
            },
            (StimulusKind::Distractor, true) => Classification::failure(Outcome::Wrong),
            (StimulusKind::Normal, false) => Classification::failure(Outcome::Timeout),
            (StimulusKind::Normal, true) if self.is_guess(response_time) => {
                Classification::failure(Outcome::Guess)
            }
            (StimulusKind::Normal, true) if self.is_valid(response_time) => Classification {
                outcome: Outcome::Correct,
                success: true,
                accuracy: self.accuracy(duration, response_time)?,
            },
            (StimulusKind::Normal, true) => Classification::failure(Outcome::Slow),
        };

        Ok(classification)
    }
}
