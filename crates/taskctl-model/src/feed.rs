use serde::{Deserialize, Serialize};

/// Lower bound of [`Batch::target`]; keeps progress bars from reading "100%" on tiny harvests.
pub const TARGET_FLOOR: usize = 100;

/// A group of newly harvested items delivered together to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch<T> {
    pub items: Vec<T>,
    /// Total number of items harvested so far, this batch included.
    pub cumulative_count: usize,
    /// Progress-bar hint: `max(cumulative_count, 100)`.
    pub target: usize,
}

impl<T> Batch<T> {
    pub fn new(items: Vec<T>, cumulative_count: usize) -> Self {
        Self {
            items,
            cumulative_count,
            target: cumulative_count.max(TARGET_FLOOR),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// One search result of the short-video feed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoItem {
    pub title: String,
    pub link: String,
    pub author: String,
}
