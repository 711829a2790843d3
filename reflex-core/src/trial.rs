use serde::{Deserialize, Serialize};

use crate::attributes::{Attributes, names};
use crate::stimulus::StimulusKind;

/// A fully resolved trial, ready to be presented. Times are in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub index: usize,
    pub delay: f64,
    pub duration: f64,
    pub position: (f32, f32),
    pub kind: StimulusKind,
}

impl Trial {
    /// The kind used for classification. Distractor flags only count when
    /// the session includes distractors.
    pub fn effective_kind(&self, include_distractor: bool) -> StimulusKind {
        if include_distractor {
            self.kind
        } else {
            StimulusKind::Normal
        }
    }

    /// Writes the resolved (not declared) values back as attributes.
    pub fn export(&self) -> Attributes {
        let mut attrs = Attributes::new();
        attrs.set(names::DELAY, self.delay);
        attrs.set(names::DURATION, self.duration);
        attrs.set(names::POSITION_X, self.position.0);
        attrs.set(names::POSITION_Y, self.position.1);
        attrs.set(names::IS_DISTRACTOR, self.kind.is_distractor());
        attrs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Correct,
    Guess,
    Timeout,
    Slow,
    Wrong,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackCategory {
    Good,
    Bad,
}

impl Outcome {
    pub const ALL: [Outcome; 5] = [
        Outcome::Correct,
        Outcome::Guess,
        Outcome::Timeout,
        Outcome::Slow,
        Outcome::Wrong,
    ];

    /// Text shown to the participant after the trial.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Correct => "Good!",
            Outcome::Guess => "No Guessing!",
            Outcome::Timeout => "Missed it!",
            Outcome::Slow => "Too Slow!",
            Outcome::Wrong => "Wrong!",
        }
    }

    pub fn category(&self) -> FeedbackCategory {
        match self {
            Outcome::Correct => FeedbackCategory::Good,
            _ => FeedbackCategory::Bad,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Correct => "CORRECT",
            Outcome::Guess => "GUESS",
            Outcome::Timeout => "TIMEOUT",
            Outcome::Slow => "SLOW",
            Outcome::Wrong => "WRONG",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded result per trial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub trial: Trial,
    /// Seconds from window open to response; `0.0` when nobody responded.
    pub response_time: f64,
    pub outcome: Outcome,
    pub success: bool,
    pub accuracy: f64,
    /// Timer reading of the response, or of the window deadline when nobody
    /// responded in time.
    pub timestamp_ns: u64,
}

impl TrialResult {
    pub fn responded(&self) -> bool {
        self.response_time != 0.0
    }

    /// Resolved trial attributes followed by the result attributes, as one
    /// flat record.
    pub fn export(&self) -> Attributes {
        let mut attrs = self.trial.export();
        attrs.set(names::RESPONSE_TIME, self.response_time);
        attrs.set(names::SUCCESS, self.success);
        attrs.set(names::ACCURACY, self.accuracy);
        attrs.set(names::OUTCOME, self.outcome.as_str());
        attrs
    }
}
