use reflex_core::attributes::{Attributes, names};
use serde::{Deserialize, Serialize};
use std::io::Write;

use super::config::{SessionConfig, SessionFile};
use super::log::{ResultLog, SessionSummary};

/// Exported session: the session attributes and one flat record per
/// completed trial holding resolved trial values and the result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session: Attributes,
    pub trials: Vec<Attributes>,
    pub summary: SessionSummary,
}

impl SessionReport {
    pub fn new(config: &SessionConfig, log: &ResultLog) -> Self {
        Self {
            session: config.export(),
            trials: log.iter().map(|r| r.export()).collect(),
            summary: log.summary(),
        }
    }

    pub fn write_json<W: Write>(&self, writer: W) -> serde_json::Result<()> {
        serde_json::to_writer_pretty(writer, self)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// A session file that presents the recorded trials again, exactly as
    /// they were resolved. Random positions are switched off so the exported
    /// coordinates are used.
    pub fn replay_file(&self) -> SessionFile {
        let mut session = self.session.clone();
        session.set(names::RANDOM_POSITIONS, false);
        let trials = self
            .trials
            .iter()
            .map(|record| {
                let mut trial = Attributes::new();
                for name in [
                    names::DELAY,
                    names::DURATION,
                    names::POSITION_X,
                    names::POSITION_Y,
                    names::IS_DISTRACTOR,
                ] {
                    if let Some(value) = record.get(name) {
                        trial.set(name, value.clone());
                    }
                }
                trial
            })
            .collect();
        SessionFile { session, trials }
    }
}
