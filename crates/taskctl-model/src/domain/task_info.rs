use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Free-form task metadata carried inside a control slot.
///
/// The well-known keys are typed; anything else written by other tools is
/// preserved in `extra` so a read-modify-write cycle never drops it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskInfo {
    /// Kind label of the running job (e.g. `collect_links`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    /// Human-readable progress text shown by the supervising side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Start time, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    /// End time, seconds since the Unix epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskInfo {
    pub fn new(task_type: impl Into<String>) -> Self {
        Self {
            task_type: Some(task_type.into()),
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.task_type.is_none()
            && self.status.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.extra.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_keys_survive() {
        let raw = r#"{"task_type":"collect","status":"page 3","progress":42}"#;
        let info: TaskInfo = serde_json::from_str(raw).unwrap();

        assert_eq!(info.task_type.as_deref(), Some("collect"));
        assert_eq!(info.extra.get("progress"), Some(&Value::from(42)));

        let back = serde_json::to_value(&info).unwrap();
        assert_eq!(back["progress"], 42);
        assert!(back.get("end_time").is_none());
    }

    #[test]
    fn empty_by_default() {
        assert!(TaskInfo::default().is_empty());
        assert!(!TaskInfo::new("x").is_empty());
    }
}
