//! Error taxonomy for session loading, classification and sequencing.
//!
//! A response arriving outside an open input window is not an error: the
//! state machine drops it and reports the event as unhandled.

use thiserror::Error;

use crate::attributes::AttributeValue;

/// A declarative attribute had a value of the wrong shape.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("attribute `{name}`: expected {expected}, found `{found}`")]
pub struct AttributeError {
    pub name: String,
    pub expected: &'static str,
    pub found: String,
}

impl AttributeError {
    pub fn new(name: &str, expected: &'static str, found: &AttributeValue) -> Self {
        Self {
            name: name.to_string(),
            expected,
            found: found.to_string(),
        }
    }
}

/// Unrecoverable session configuration problems. Any of these aborts the
/// session load.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Attribute(#[from] AttributeError),

    #[error("`{name}` must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("position range for the {axis} axis is inverted ({min} > {max})")]
    InvertedRange { axis: char, min: f32, max: f32 },

    /// The accuracy denominator of a trial would be zero.
    #[error(
        "trial {trial}: accuracy window {window} equals the guess time limit, accuracy is undefined"
    )]
    DegenerateWindow { trial: usize, window: f64 },

    #[error("malformed session file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifyError {
    #[error("accuracy window {window} leaves no room after guess time limit {guess_time_limit}")]
    DegenerateWindow { window: f64, guess_time_limit: f64 },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error("session has already been started")]
    AlreadyStarted,
}
