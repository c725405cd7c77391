use async_trait::async_trait;
use taskctl_core::ProcessHandle;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::SurfaceError;

/// A scrollable content feed, typically a browser page driven by automation.
///
/// Content arrives out-of-band: responses triggered by scrolling are decoded by the
/// surface and pushed into the receiver returned from [`FeedSurface::take_batches`].
#[async_trait]
pub trait FeedSurface: Send {
    type Item: Send + 'static;

    /// Navigate to the feed for `query` and start intercepting responses.
    async fn open(&mut self, query: &str) -> Result<(), SurfaceError>;

    /// Current rendered content height.
    async fn content_height(&mut self) -> Result<u64, SurfaceError>;

    /// Trigger loading of more content.
    async fn scroll_to_bottom(&mut self) -> Result<(), SurfaceError>;

    /// Whether the feed shows its explicit "no more content" marker.
    async fn has_end_marker(&mut self) -> Result<bool, SurfaceError>;

    /// Release the surface. Must not fail.
    async fn close(&mut self);

    /// Intercepted batches. Called once after a successful [`FeedSurface::open`].
    fn take_batches(&mut self) -> Option<UnboundedReceiver<Vec<Self::Item>>>;

    /// External process backing the surface, if any; it gets registered with the guard.
    fn process(&self) -> Option<ProcessHandle> {
        None
    }
}
