//! Cooperative pause/resume/stop control for long-running jobs.
//!
//! A supervisor ([`TaskController`]) and a worker ([`TaskGuard`]) share nothing but a
//! [`ControlChannel`] slot, so they may live in different processes.

pub mod error;
pub use error::{ChannelError, JobError, RegistryError};

mod channel;
pub use channel::{CONTROL_DIR, CONTROL_FILE_ENV, ControlChannel};

mod guard;
pub use guard::{GuardConfig, TaskGuard};

pub mod proc;
pub use proc::{ProcessHandle, Termination};

mod progress;
pub use progress::ProgressReporter;

mod controller;
pub use controller::{StatusView, TaskController};

mod job;
pub use job::{FnJob, Job};

mod registry;
pub use registry::JobRegistry;

mod state;
pub use state::SessionTable;
