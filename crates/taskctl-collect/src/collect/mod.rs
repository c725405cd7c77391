use std::{sync::Arc, time::Duration};

use serde::Serialize;
use taskctl_core::TaskGuard;
use taskctl_model::Batch;
use tokio::{
    sync::mpsc::{self, UnboundedReceiver},
    task::JoinHandle,
};
use tracing::{debug, info, trace, warn};

use crate::{
    sink::{BatchSink, ChannelSink},
    surface::FeedSurface,
};

#[derive(Debug, Clone)]
pub struct CollectConfig {
    /// Wait after each scroll for responses to arrive.
    pub settle: Duration,
    /// Pause between scroll cycles.
    pub cooldown: Duration,
    /// Consecutive scrolls without height growth before giving up.
    pub max_retries: u32,
    /// Buffer of the channel behind [`BatchStream`].
    pub stream_buffer: usize,
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            settle: Duration::from_secs(2),
            cooldown: Duration::from_secs(3),
            max_retries: 3,
            stream_buffer: 16,
        }
    }
}

impl CollectConfig {
    pub fn with_settle(mut self, d: Duration) -> Self {
        self.settle = d;
        self
    }

    pub fn with_cooldown(mut self, d: Duration) -> Self {
        self.cooldown = d;
        self
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = n.max(1);
        self
    }
}

/// Why collection ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "camelCase")]
pub enum EndReason {
    /// The feed showed its "no more content" marker.
    NoMoreMarker,
    /// Content height stopped growing for `max_retries` scrolls.
    HeightStable,
    /// The guard observed a stop request.
    Stopped,
    /// The surface failed; whatever was harvested is kept.
    Aborted(String),
}

impl EndReason {
    /// Content exhausted (either signal), as opposed to interrupted.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, EndReason::NoMoreMarker | EndReason::HeightStable)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectReport<T> {
    /// Every delivered item in arrival order.
    pub harvested: Vec<T>,
    /// Scroll actions performed.
    pub scrolls: u32,
    pub end: EndReason,
}

/// Scroll-and-harvest loop.
#[derive(Debug, Clone, Default)]
pub struct CollectionLoop {
    cfg: CollectConfig,
}

struct Harvest<'a, T, K> {
    items: Vec<T>,
    sink: &'a mut K,
}

impl<T, K> Harvest<'_, T, K>
where
    T: Clone + Send + Sync,
    K: BatchSink<T>,
{
    /// Append and push to the sink immediately. Empty batches are skipped.
    async fn deliver(&mut self, items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        self.items.extend(items.iter().cloned());
        let batch = Batch::new(items, self.items.len());
        trace!(target: "taskctl.collect.loop", size = batch.len(), total = batch.cumulative_count, "batch");
        match self.sink.accept(&batch).await {
            Ok(true) => {}
            Ok(false) => debug!(target: "taskctl.collect.loop", total = batch.cumulative_count, "sink declined batch"),
            Err(e) => warn!(target: "taskctl.collect.loop", error = %e, "sink failed; continuing"),
        }
    }

    async fn drain(&mut self, rx: Option<&mut UnboundedReceiver<Vec<T>>>) {
        let Some(rx) = rx else {
            return;
        };
        while let Ok(items) = rx.try_recv() {
            self.deliver(items).await;
        }
    }
}

impl CollectionLoop {
    pub fn new(cfg: CollectConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &CollectConfig {
        &self.cfg
    }

    /// Drive `surface` until the feed is exhausted, a stop is observed or the surface fails.
    ///
    /// Never returns an error: failures end the loop with [`EndReason::Aborted`] and
    /// the partial harvest.
    pub async fn run<S, K>(
        &self,
        surface: &mut S,
        guard: &TaskGuard,
        sink: &mut K,
        query: &str,
    ) -> CollectReport<S::Item>
    where
        S: FeedSurface,
        S::Item: Clone + Send + Sync,
        K: BatchSink<S::Item>,
    {
        let session = guard.session_id().to_string();
        let mut harvest = Harvest {
            items: Vec::new(),
            sink,
        };
        let mut scrolls = 0u32;

        if let Err(e) = surface.open(query).await {
            warn!(target: "taskctl.collect.loop", %session, error = %e, "open failed");
            surface.close().await;
            return CollectReport {
                harvested: harvest.items,
                scrolls,
                end: EndReason::Aborted(e.to_string()),
            };
        }
        if let Some(handle) = surface.process() {
            guard.register_child(handle);
        }
        let mut rx = surface.take_batches();
        info!(target: "taskctl.collect.loop", %session, %query, "collection started");

        let mut retries = 0u32;
        let end = loop {
            if guard.checkpoint().await.is_err() {
                break EndReason::Stopped;
            }

            let before = match surface.content_height().await {
                Ok(h) => h,
                Err(e) => break EndReason::Aborted(e.to_string()),
            };
            if let Err(e) = surface.scroll_to_bottom().await {
                break EndReason::Aborted(e.to_string());
            }
            scrolls += 1;

            if !self.settle(guard, rx.as_mut(), &mut harvest).await {
                break EndReason::Stopped;
            }
            harvest.drain(rx.as_mut()).await;

            match surface.has_end_marker().await {
                Ok(true) => break EndReason::NoMoreMarker,
                Ok(false) => {}
                Err(e) => break EndReason::Aborted(e.to_string()),
            }

            let after = match surface.content_height().await {
                Ok(h) => h,
                Err(e) => break EndReason::Aborted(e.to_string()),
            };
            if after > before {
                retries = 0;
            } else {
                retries += 1;
                debug!(target: "taskctl.collect.loop", %session, height = after, retries, "height unchanged");
                if retries >= self.cfg.max_retries {
                    break EndReason::HeightStable;
                }
            }

            if !guard.sleep(self.cfg.cooldown).await {
                break EndReason::Stopped;
            }
        };

        harvest.drain(rx.as_mut()).await;
        surface.close().await;

        match &end {
            EndReason::Aborted(reason) => {
                warn!(target: "taskctl.collect.loop", %session, %reason, harvested = harvest.items.len(), scrolls, "collection aborted")
            }
            _ => {
                info!(target: "taskctl.collect.loop", %session, end = ?end, harvested = harvest.items.len(), scrolls, "collection finished")
            }
        }
        CollectReport {
            harvested: harvest.items,
            scrolls,
            end,
        }
    }

    /// Interruptible settle wait that delivers batches as they arrive.
    async fn settle<T, K>(
        &self,
        guard: &TaskGuard,
        rx: Option<&mut UnboundedReceiver<Vec<T>>>,
        harvest: &mut Harvest<'_, T, K>,
    ) -> bool
    where
        T: Clone + Send + Sync,
        K: BatchSink<T>,
    {
        let Some(rx) = rx else {
            return guard.sleep(self.cfg.settle).await;
        };
        let wait = guard.sleep(self.cfg.settle);
        tokio::pin!(wait);
        loop {
            tokio::select! {
                biased;
                done = &mut wait => return done,
                received = rx.recv() => match received {
                    Some(items) => harvest.deliver(items).await,
                    None => return (&mut wait).await,
                },
            }
        }
    }

    /// Run the loop on a background task and expose its batches as a lazy sequence.
    pub fn collect<S>(&self, surface: S, guard: Arc<TaskGuard>, query: impl Into<String>) -> BatchStream<S::Item>
    where
        S: FeedSurface + 'static,
        S::Item: Clone + Send + Sync,
    {
        let (tx, rx) = mpsc::channel(self.cfg.stream_buffer.max(1));
        let this = self.clone();
        let query = query.into();
        let task = tokio::spawn(async move {
            let mut surface = surface;
            let mut sink = ChannelSink::new(tx);
            this.run(&mut surface, &guard, &mut sink, &query).await
        });
        BatchStream { rx, task }
    }
}

/// Finite, non-restartable sequence of batches produced by [`CollectionLoop::collect`].
pub struct BatchStream<T> {
    rx: mpsc::Receiver<Batch<T>>,
    task: JoinHandle<CollectReport<T>>,
}

impl<T> BatchStream<T> {
    /// Next batch, or `None` once collection has ended and everything was consumed.
    pub async fn next(&mut self) -> Option<Batch<T>> {
        self.rx.recv().await
    }

    /// Stop consuming and wait for the loop's report.
    ///
    /// Batches not yet consumed are still part of `harvested`.
    pub async fn finish(self) -> CollectReport<T> {
        drop(self.rx);
        match self.task.await {
            Ok(report) => report,
            Err(e) => CollectReport {
                harvested: Vec::new(),
                scrolls: 0,
                end: EndReason::Aborted(format!("collection task failed: {e}")),
            },
        }
    }
}
