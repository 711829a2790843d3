pub mod config;
pub mod log;
pub mod report;
pub mod state;
pub mod trial;

pub use config::{PositionRange, SessionConfig, SessionFile};
pub use log::{ResultLog, SessionSummary};
pub use report::SessionReport;
pub use state::{SessionEvent, SessionStateMachine, Signal, WakeToken};
pub use trial::{TrialSpec, TrialTimestamps};
