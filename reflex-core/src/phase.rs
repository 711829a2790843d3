/// Sequencer states for one session.
///
/// `Idle -> PresentingDelay -> InputWindowOpen -> Classifying`, then either
/// back to `PresentingDelay` for the next trial or on to `Finished`.
#[derive(Copy, Debug, Clone, Default, PartialEq, Eq)]
pub enum SequencerState {
    #[default]
    Idle,
    PresentingDelay,
    InputWindowOpen,
    Classifying,
    Finished,
}

impl SequencerState {
    /// Only the open input window listens for responses.
    pub fn allows_input(&self) -> bool {
        matches!(self, Self::InputWindowOpen)
    }

    pub fn is_running(&self) -> bool {
        matches!(
            self,
            Self::PresentingDelay | Self::InputWindowOpen | Self::Classifying
        )
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }

    /// The state after `self` when it completes normally. `has_more_trials`
    /// decides where classification leads.
    pub fn next(&self, has_more_trials: bool) -> Option<Self> {
        use SequencerState::*;
        Some(match self {
            Idle if has_more_trials => PresentingDelay,
            Idle => Finished,
            PresentingDelay => InputWindowOpen,
            InputWindowOpen => Classifying,
            Classifying if has_more_trials => PresentingDelay,
            Classifying => Finished,
            Finished => return None,
        })
    }
}

impl std::fmt::Display for SequencerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SequencerState::Idle => "idle",
            SequencerState::PresentingDelay => "presenting-delay",
            SequencerState::InputWindowOpen => "input-window-open",
            SequencerState::Classifying => "classifying",
            SequencerState::Finished => "finished",
        };
        write!(f, "{}", name)
    }
}
