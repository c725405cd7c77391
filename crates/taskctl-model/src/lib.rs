//! Shared data model for controlled task execution.
//!
//! Everything here is plain data exchanged between the supervising side (a UI or scheduler),
//! the worker running a job, and the sinks receiving harvested batches. No I/O happens in this crate.

mod domain;
pub use domain::*;

mod feed;
pub use feed::{Batch, VideoItem};
