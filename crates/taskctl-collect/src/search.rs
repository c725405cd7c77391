//! Decoding of the short-video site's search feed.

use serde_json::Value;
use taskctl_model::VideoItem;
use tracing::debug;

/// Path fragment identifying search-result responses.
pub const SEARCH_ENDPOINT: &str = "aweme/v1/web/search/item";
/// CSS selector of the element carrying the end-of-feed text.
pub const END_MARKER_SELECTOR: &str = "div.ECAcoo0p div.shrAJJLa";
/// Text shown once the feed has nothing more ("no more for now").
pub const END_MARKER_TEXT: &str = "暂时没有更多了";

const VIDEO_LINK_BASE: &str = "https://www.douyin.com/video/";
const VIDEO_ENTRY_TYPE: i64 = 1;

/// Search page URL for `keyword`.
pub fn search_url(keyword: &str) -> String {
    format!("https://www.douyin.com/discover/search/{keyword}?type=video")
}

/// Video entries of an intercepted response.
///
/// Returns `None` for responses from other endpoints and for bodies that fail to
/// decode; `Some(vec![])` for a search response without video entries.
pub fn decode_search_response(url: &str, body: &[u8]) -> Option<Vec<VideoItem>> {
    if !url.contains(SEARCH_ENDPOINT) {
        return None;
    }
    let page: Value = match serde_json::from_slice(body) {
        Ok(v) => v,
        Err(e) => {
            debug!(target: "taskctl.collect.search", %url, error = %e, "undecodable search response");
            return None;
        }
    };
    let Some(entries) = page.get("data").and_then(Value::as_array) else {
        return Some(Vec::new());
    };

    let items = entries
        .iter()
        .filter(|e| e.get("type").and_then(Value::as_i64) == Some(VIDEO_ENTRY_TYPE))
        .map(|e| {
            let info = e.get("aweme_info");
            let field = |path: &[&str]| -> String {
                let mut v = info;
                for key in path {
                    v = v.and_then(|x| x.get(*key));
                }
                match v {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Number(n)) => n.to_string(),
                    _ => String::new(),
                }
            };
            VideoItem {
                title: field(&["desc"]),
                link: format!("{VIDEO_LINK_BASE}{}", field(&["aweme_id"])),
                author: field(&["author", "nickname"]),
            }
        })
        .collect();
    Some(items)
}

/// Whether rendered marker text means the feed is exhausted.
pub fn is_end_marker(text: &str) -> bool {
    text.contains(END_MARKER_TEXT)
}
