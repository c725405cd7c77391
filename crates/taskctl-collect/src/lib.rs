//! Paginated scroll-and-harvest collection against a content feed.
//!
//! A [`CollectionLoop`] drives a [`FeedSurface`] (something that can scroll and
//! intercept the responses it triggers) and pushes every intercepted batch to a
//! [`BatchSink`] as soon as it arrives. All waits go through the job's
//! [`TaskGuard`](taskctl_core::TaskGuard), so pause and stop take effect within one
//! scroll cycle.

mod error;
pub use error::{SinkError, SurfaceError};

mod surface;
pub use surface::FeedSurface;

mod sink;
pub use sink::{BatchSink, ChannelSink, FnSink, VecSink};

mod collect;
pub use collect::{BatchStream, CollectConfig, CollectReport, CollectionLoop, EndReason};

pub mod search;
