//! # maestro-engine
//!
//! Task execution engine for Maestro. A task is decomposed into an ordered
//! step list (caller-supplied or planned via the reasoning model with
//! deterministic fallbacks) and executed strictly in order, each step
//! dispatching either to the model gateway or to a running tool worker.
//! Progress fans out to per-task subscribers; cancellation is cooperative
//! and observed between steps.
//!
//! The engine holds all task state in memory for the lifetime of the
//! process. Durable storage sits outside this crate.

pub mod engine;
pub mod planner;
pub mod progress;
pub mod task;

pub use engine::{EngineStats, TaskEngine};
pub use planner::Planner;
pub use progress::{ListenerId, ProgressFanout, ProgressListener};
pub use task::{StepId, StepSpec, StepStatus, Task, TaskId, TaskSpec, TaskStatus, TaskStep};
