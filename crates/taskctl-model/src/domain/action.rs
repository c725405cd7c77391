use std::fmt;

use serde::{Deserialize, Serialize};

use crate::RunStatus;

/// Directive carried by a control slot.
///
/// The supervising side writes `run`/`pause`/`resume`/`stop`; the worker's progress
/// reporter writes `completed` once the job is done. Older writers emit `running` for
/// an ordinary status update, which is read as `run`.
/// Any other string is kept as [`Action::Unknown`] so the rest of the slot stays readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Action {
    #[default]
    Run,
    Pause,
    Resume,
    Stop,
    Completed,
    Unknown,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Run => "run",
            Action::Pause => "pause",
            Action::Resume => "resume",
            Action::Stop => "stop",
            Action::Completed => "completed",
            Action::Unknown => "unknown",
        }
    }

    /// Display status mirrored next to the directive.
    pub fn status(&self) -> RunStatus {
        match self {
            Action::Run | Action::Resume | Action::Unknown => RunStatus::Running,
            Action::Pause => RunStatus::Paused,
            Action::Stop => RunStatus::Stopped,
            Action::Completed => RunStatus::Completed,
        }
    }
}

impl From<&str> for Action {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "run" | "running" => Action::Run,
            "pause" => Action::Pause,
            "resume" => Action::Resume,
            "stop" => Action::Stop,
            "completed" => Action::Completed,
            _ => Action::Unknown,
        }
    }
}

impl From<String> for Action {
    fn from(s: String) -> Self {
        Action::from(s.as_str())
    }
}

impl From<Action> for String {
    fn from(a: Action) -> Self {
        a.as_str().to_string()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_running_reads_as_run() {
        let a: Action = serde_json::from_str(r#""running""#).unwrap();
        assert_eq!(a, Action::Run);
    }

    #[test]
    fn unrecognised_directive_is_unknown() {
        let a: Action = serde_json::from_str(r#""explode""#).unwrap();
        assert_eq!(a, Action::Unknown);
        assert_eq!(a.status(), RunStatus::Running);
    }

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Action::Pause).unwrap(), r#""pause""#);
        assert_eq!(serde_json::to_string(&Action::Stop).unwrap(), r#""stop""#);
    }

    #[test]
    fn status_mirror() {
        assert_eq!(Action::Pause.status(), RunStatus::Paused);
        assert_eq!(Action::Resume.status(), RunStatus::Running);
        assert_eq!(Action::Stop.status(), RunStatus::Stopped);
        assert_eq!(Action::Completed.status(), RunStatus::Completed);
    }
}
