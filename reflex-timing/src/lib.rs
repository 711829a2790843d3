pub mod timer;

pub use timer::{
    CalibrationStats, HighPrecisionTimer, ManualTimer, Timer, ns_to_secs, secs_to_ns,
};
