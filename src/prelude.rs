//!
//! A collection of commonly used imports.
//!

pub use crate::runtime::{
    Builder, EventHandle, EventState, Replay, ReplayTrace, RunSummary, Runtime, RuntimeLimit,
    SchedulerKind, StopReason,
};
pub use crate::time::{Duration, SimTime};
