//! Concurrent superstep execution: fans a frontier of ready nodes out to
//! bounded-concurrency tasks and gates re-execution on per-node version
//! tracking so an unchanged node is not rerun every step.

pub mod scheduler;

pub use scheduler::{Scheduler, SchedulerError, SchedulerState, StepRunResult};
