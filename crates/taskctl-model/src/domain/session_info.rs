use serde::{Deserialize, Serialize};

use crate::{Outcome, RunStatus, SessionId};

/// Bookkeeping record of one `run()` invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    /// Short identifier shared with the log lines of this invocation.
    pub session_id: SessionId,
    /// Registered job name (or a free label for ad-hoc jobs).
    pub job: String,
    /// Current execution state.
    pub status: RunStatus,
    /// Terminal outcome; `None` while the job is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
    /// Seconds since the Unix epoch.
    pub started_at: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<f64>,
}

impl SessionInfo {
    pub fn started(session_id: SessionId, job: impl Into<String>) -> Self {
        Self {
            session_id,
            job: job.into(),
            status: RunStatus::Running,
            outcome: None,
            started_at: crate::epoch_seconds(),
            finished_at: None,
        }
    }

    /// Record the terminal outcome.
    pub fn finish(&mut self, outcome: Outcome) {
        self.status = outcome.status();
        self.outcome = Some(outcome);
        self.finished_at = Some(crate::epoch_seconds());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_records_outcome() {
        let mut info = SessionInfo::started("ab12cd34".into(), "collect");
        assert_eq!(info.status, RunStatus::Running);
        assert!(info.finished_at.is_none());

        info.finish(Outcome::Cancelled);
        assert_eq!(info.status, RunStatus::Stopped);
        assert_eq!(info.outcome, Some(Outcome::Cancelled));
        assert!(info.finished_at.unwrap() >= info.started_at);
    }

    #[test]
    fn active_session_omits_terminal_fields() {
        let info = SessionInfo::started("s1".into(), "job");
        let json = serde_json::to_value(&info).unwrap();

        assert_eq!(json["sessionId"], "s1");
        assert!(json.get("outcome").is_none());
        assert!(json.get("finishedAt").is_none());
    }
}
