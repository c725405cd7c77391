use std::{collections::HashSet, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use taskctl_collect::{CollectConfig, CollectionLoop, EndReason, FnSink, SinkError};
use taskctl_core::{Job, JobError, TaskGuard};
use taskctl_model::{Batch, VideoItem};
use tracing::info;

use crate::feed::SimulatedFeed;

pub const JOB_NAME: &str = "collect_links";

#[derive(Debug, Deserialize)]
pub struct CollectParams {
    pub keyword: String,
    #[serde(default = "default_pages")]
    pub pages: u32,
    /// Shorter settle/cooldown waits, for demos and tests.
    #[serde(default)]
    pub fast: bool,
}

fn default_pages() -> u32 {
    5
}

/// Scrolls the search feed for a keyword and keeps the unique video links.
pub struct CollectLinks;

pub fn collect_links_job() -> Arc<dyn Job> {
    Arc::new(CollectLinks)
}

#[async_trait]
impl Job for CollectLinks {
    fn name(&self) -> &str {
        JOB_NAME
    }

    async fn run(&self, guard: Arc<TaskGuard>, params: Value) -> Result<(), JobError> {
        let params: CollectParams =
            serde_json::from_value(params).context("invalid collect_links params")?;
        let progress = guard.progress();
        progress.init_task(JOB_NAME);

        let cfg = if params.fast {
            CollectConfig::default()
                .with_settle(Duration::from_millis(300))
                .with_cooldown(Duration::from_millis(200))
        } else {
            CollectConfig::default()
        };

        let mut feed = SimulatedFeed::new(params.pages).with_latency(cfg.settle / 4);
        let mut seen = HashSet::new();
        let mut sink = FnSink::new(|batch: &Batch<VideoItem>| -> Result<bool, SinkError> {
            let fresh = batch
                .items
                .iter()
                .filter(|v| seen.insert(v.link.clone()))
                .count();
            progress.update_status(format!(
                "Collected {}/{} videos",
                batch.cumulative_count, batch.target
            ));
            Ok(fresh > 0)
        });

        let report = CollectionLoop::new(cfg)
            .run(&mut feed, &guard, &mut sink, &params.keyword)
            .await;
        drop(sink);
        let unique = seen.len();

        match report.end {
            EndReason::Stopped => Err(JobError::Interrupted),
            EndReason::Aborted(reason) if unique == 0 => Err(JobError::failed(reason)),
            EndReason::Aborted(reason) => {
                info!(target: "feed_demo.job", %reason, unique, "keeping partial harvest");
                progress.complete_task(format!("Collected {unique} unique videos (ended early)"));
                Ok(())
            }
            _ => {
                progress.complete_task(format!("Collected {unique} unique videos"));
                Ok(())
            }
        }
    }
}
