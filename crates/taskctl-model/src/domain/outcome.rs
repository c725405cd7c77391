use serde::{Deserialize, Serialize};

use crate::RunStatus;

/// Terminal result of one job invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Outcome {
    /// The job body returned normally.
    Completed,
    /// The job was stopped (cooperatively or by force).
    Cancelled,
    /// The job body returned an error or panicked.
    Failed { message: String },
}

impl Outcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Outcome::Failed {
            message: message.into(),
        }
    }

    /// Status shown to the supervising side for this outcome.
    ///
    /// A failure still ends the run, so it maps to `Completed` with the
    /// error embedded in the status text.
    pub fn status(&self) -> RunStatus {
        match self {
            Outcome::Completed | Outcome::Failed { .. } => RunStatus::Completed,
            Outcome::Cancelled => RunStatus::Stopped,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_wire_format() {
        let json = serde_json::to_value(Outcome::failed("boom")).unwrap();
        assert_eq!(json["kind"], "failed");
        assert_eq!(json["message"], "boom");

        let back: Outcome = serde_json::from_str(r#"{"kind":"cancelled"}"#).unwrap();
        assert_eq!(back, Outcome::Cancelled);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(Outcome::Completed.status(), RunStatus::Completed);
        assert_eq!(Outcome::Cancelled.status(), RunStatus::Stopped);
        assert_eq!(Outcome::failed("x").status(), RunStatus::Completed);
    }
}
