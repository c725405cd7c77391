use serde::{Deserialize, Serialize};

use crate::{Action, RunStatus, TaskInfo};

/// Content of a control slot shared between a supervisor and a worker.
///
/// Last write wins; `timestamp` is informational only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ControlState {
    #[serde(default)]
    pub action: Action,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "TaskInfo::is_empty")]
    pub task_info: TaskInfo,
    /// Seconds since the Unix epoch of the last write.
    #[serde(default)]
    pub timestamp: f64,
    /// Hint for the supervising UI to dismiss itself once the job completed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub auto_close: bool,
}

impl ControlState {
    /// State with `action` and its mirrored display status.
    pub fn directive(action: Action) -> Self {
        Self {
            action,
            status: action.status(),
            ..Default::default()
        }
    }

    /// Initial content of a freshly created slot: `{run, running}`.
    pub fn running() -> Self {
        Self::directive(Action::Run)
    }

    pub fn with_task_info(mut self, info: TaskInfo) -> Self {
        self.task_info = info;
        self
    }

    /// Replace the directive, keeping task metadata.
    pub fn set_action(&mut self, action: Action) {
        self.action = action;
        self.status = action.status();
    }
}
