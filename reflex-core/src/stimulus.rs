use serde::{Deserialize, Serialize};

/// Which stimulus a trial presents.
///
/// A distractor is drawn in a different colour and must be ignored by the
/// participant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimulusKind {
    #[default]
    Normal,
    Distractor,
}

impl StimulusKind {
    pub fn from_flag(is_distractor: bool) -> Self {
        if is_distractor {
            StimulusKind::Distractor
        } else {
            StimulusKind::Normal
        }
    }

    pub fn is_distractor(&self) -> bool {
        matches!(self, StimulusKind::Distractor)
    }

    /// RGBA fill colour for the presentation layer.
    pub fn color(&self) -> [u8; 4] {
        match self {
            StimulusKind::Normal => [255, 255, 255, 255],
            StimulusKind::Distractor => [255, 0, 0, 255],
        }
    }
}

impl std::fmt::Display for StimulusKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StimulusKind::Normal => write!(f, "normal"),
            StimulusKind::Distractor => write!(f, "distractor"),
        }
    }
}
