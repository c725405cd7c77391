use async_trait::async_trait;
use taskctl_model::Batch;
use tokio::sync::mpsc;

use crate::error::SinkError;

/// Caller-supplied acceptor of harvested batches.
///
/// The return value is informational; the loop only logs it. Deduplication, if
/// wanted, is the sink's business.
#[async_trait]
pub trait BatchSink<T: Send + Sync>: Send {
    async fn accept(&mut self, batch: &Batch<T>) -> Result<bool, SinkError>;
}

/// Forwards batches into a bounded channel, applying backpressure to the loop.
#[derive(Debug)]
pub struct ChannelSink<T> {
    tx: mpsc::Sender<Batch<T>>,
}

impl<T> ChannelSink<T> {
    pub fn new(tx: mpsc::Sender<Batch<T>>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> BatchSink<T> for ChannelSink<T> {
    async fn accept(&mut self, batch: &Batch<T>) -> Result<bool, SinkError> {
        self.tx
            .send(batch.clone())
            .await
            .map(|_| true)
            .map_err(|_| SinkError("receiver dropped".to_string()))
    }
}

/// Sink backed by a synchronous closure, e.g. a storage write.
pub struct FnSink<F> {
    f: F,
}

impl<F> FnSink<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<T, F> BatchSink<T> for FnSink<F>
where
    T: Send + Sync,
    F: FnMut(&Batch<T>) -> Result<bool, SinkError> + Send,
{
    async fn accept(&mut self, batch: &Batch<T>) -> Result<bool, SinkError> {
        (self.f)(batch)
    }
}

/// Keeps every batch in memory.
#[derive(Debug)]
pub struct VecSink<T> {
    pub batches: Vec<Batch<T>>,
}

impl<T> Default for VecSink<T> {
    fn default() -> Self {
        Self {
            batches: Vec::new(),
        }
    }
}

impl<T> VecSink<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_items(self) -> Vec<T> {
        self.batches.into_iter().flat_map(|b| b.items).collect()
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> BatchSink<T> for VecSink<T> {
    async fn accept(&mut self, batch: &Batch<T>) -> Result<bool, SinkError> {
        self.batches.push(batch.clone());
        Ok(true)
    }
}
