pub mod attributes;
pub mod classify;
pub mod error;
pub mod phase;
pub mod stimulus;
pub mod trial;

pub use attributes::{AttributeValue, Attributes};
pub use classify::{Classification, ClassifierParams, is_no_response};
pub use error::{AttributeError, ClassifyError, ConfigError, SessionError};
pub use phase::SequencerState;
pub use stimulus::StimulusKind;
pub use trial::{FeedbackCategory, Outcome, Trial, TrialResult};
