use serde::{Deserialize, Serialize};

/// Display state of a controlled job, mirrored from the last directive or outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// Job is executing (or about to).
    #[default]
    Running,
    /// Job is suspended at its next checkpoint.
    Paused,
    /// Job was cancelled by a stop directive.
    Stopped,
    /// Job reached its natural end (successfully or not).
    Completed,
}

impl RunStatus {
    /// Returns `true` if the job won't transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Stopped | RunStatus::Completed)
    }

    /// Returns `true` if the job is still live (running or paused).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(RunStatus::Stopped.is_terminal());
        assert!(RunStatus::Completed.is_terminal());

        assert!(!RunStatus::Running.is_terminal());
        assert!(!RunStatus::Paused.is_terminal());
    }

    #[test]
    fn active_states() {
        assert!(RunStatus::Running.is_active());
        assert!(RunStatus::Paused.is_active());
        assert!(!RunStatus::Stopped.is_active());
    }

    #[test]
    fn wire_names() {
        let json = serde_json::to_string(&RunStatus::Paused).unwrap();
        assert_eq!(json, r#""paused""#);

        let back: RunStatus = serde_json::from_str(r#""completed""#).unwrap();
        assert_eq!(back, RunStatus::Completed);
    }
}
