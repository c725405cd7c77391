use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use taskctl_collect::{
    FeedSurface, SurfaceError,
    search::{END_MARKER_TEXT, SEARCH_ENDPOINT, decode_search_response, is_end_marker, search_url},
};
use taskctl_model::VideoItem;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::debug;

const PAGE_HEIGHT: u64 = 900;

/// Offline stand-in for a browser page on the search feed.
///
/// Every scroll "loads" one more page: the height grows at once and the matching
/// search response arrives after `latency`, decoded the same way a real
/// intercepted response would be.
pub struct SimulatedFeed {
    pages: u32,
    per_page: u32,
    latency: Duration,
    keyword: String,
    loaded: u32,
    tx: Option<UnboundedSender<Vec<VideoItem>>>,
    rx: Option<UnboundedReceiver<Vec<VideoItem>>>,
}

impl SimulatedFeed {
    pub fn new(pages: u32) -> Self {
        Self {
            pages: pages.max(1),
            per_page: 10,
            latency: Duration::from_millis(400),
            keyword: String::new(),
            loaded: 0,
            tx: None,
            rx: None,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn response_url(&self, page: u32) -> String {
        format!(
            "https://www.douyin.com/{SEARCH_ENDPOINT}/?keyword={}&offset={}",
            self.keyword,
            page * self.per_page
        )
    }

    fn response_body(&self, page: u32) -> Vec<u8> {
        let mut data: Vec<Value> = (0..self.per_page)
            .map(|i| {
                let id = page * self.per_page + i;
                json!({
                    "type": 1,
                    "aweme_info": {
                        "aweme_id": format!("73{id:08}"),
                        "desc": format!("{} clip #{id}", self.keyword),
                        "author": { "nickname": format!("creator_{}", id % 7) }
                    }
                })
            })
            .collect();
        data.push(json!({ "type": 16, "user_list": [] }));
        json!({ "status_code": 0, "data": data }).to_string().into_bytes()
    }

    fn load_page(&mut self) {
        let Some(tx) = self.tx.clone() else {
            return;
        };
        let page = self.loaded;
        self.loaded += 1;

        let url = self.response_url(page);
        let body = self.response_body(page);
        let latency = self.latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            if let Some(items) = decode_search_response(&url, &body) {
                let _ = tx.send(items);
            }
        });
    }

    fn rendered_footer(&self) -> &'static str {
        if self.loaded >= self.pages {
            END_MARKER_TEXT
        } else {
            ""
        }
    }
}

#[async_trait]
impl FeedSurface for SimulatedFeed {
    type Item = VideoItem;

    async fn open(&mut self, query: &str) -> Result<(), SurfaceError> {
        if query.trim().is_empty() {
            return Err(SurfaceError::Navigation("empty keyword".into()));
        }
        self.keyword = query.trim().to_string();
        debug!(target: "feed_demo.feed", url = %search_url(&self.keyword), "opening feed");

        let (tx, rx) = mpsc::unbounded_channel();
        self.tx = Some(tx);
        self.rx = Some(rx);
        self.load_page();
        Ok(())
    }

    async fn content_height(&mut self) -> Result<u64, SurfaceError> {
        Ok(1_200 + u64::from(self.loaded) * PAGE_HEIGHT)
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), SurfaceError> {
        if self.tx.is_none() {
            return Err(SurfaceError::Crashed("feed is closed".into()));
        }
        if self.loaded < self.pages {
            self.load_page();
        }
        Ok(())
    }

    async fn has_end_marker(&mut self) -> Result<bool, SurfaceError> {
        Ok(is_end_marker(self.rendered_footer()))
    }

    async fn close(&mut self) {
        self.tx = None;
    }

    fn take_batches(&mut self) -> Option<UnboundedReceiver<Vec<VideoItem>>> {
        self.rx.take()
    }
}
