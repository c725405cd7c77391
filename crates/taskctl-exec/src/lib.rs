//! Background execution of controlled jobs.
//!
//! [`TaskRunner`] starts a job on a tracked worker unit and supervises it from a
//! detached monitor unit that enforces stop requests. [`Dispatcher`] resolves jobs by
//! name from a [`JobRegistry`](taskctl_core::JobRegistry) and hands them to the runner.

mod error;
pub use error::RunnerError;

mod outcome;
pub use outcome::{CLOSED_TARGET_MARKERS, classify};

mod discover;
pub use discover::{ChildDiscovery, NoDiscovery, ProcScan};

mod runner;
pub use runner::{RunnerConfig, Started, TaskRunner};

mod dispatch;
pub use dispatch::Dispatcher;

pub mod prelude {
    pub use crate::{Dispatcher, RunnerConfig, RunnerError, Started, TaskRunner};
    pub use taskctl_core::{ControlChannel, FnJob, Job, JobError, JobRegistry, TaskGuard};
}
