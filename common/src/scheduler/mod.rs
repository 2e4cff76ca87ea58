// Scheduler module: tick loop, calendar gating, bounded cycle fan-out

pub mod engine;

pub use engine::{Scheduler, SchedulerConfig, SchedulerEngine, TickOutcome};
