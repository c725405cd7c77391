use taskctl_core::JobError;
use taskctl_model::Outcome;

/// Failure texts produced when an automated browser surface is closed under a job,
/// typically because a stop killed it.
pub const CLOSED_TARGET_MARKERS: &[&str] = &[
    "Target page, context or browser has been closed",
    "TargetClosedError",
];

/// Map a job result to its terminal [`Outcome`].
///
/// `stopped` is the guard's state when the job returned: a failure that races a stop
/// is treated as a consequence of the stop.
pub fn classify(result: &Result<(), JobError>, stopped: bool) -> Outcome {
    match result {
        Ok(()) => Outcome::Completed,
        Err(JobError::Interrupted | JobError::UpstreamClosed(_)) => Outcome::Cancelled,
        Err(JobError::Failed(err)) => {
            let message = format!("{err:#}");
            if stopped || CLOSED_TARGET_MARKERS.iter().any(|m| message.contains(m)) {
                Outcome::Cancelled
            } else {
                Outcome::Failed { message }
            }
        }
    }
}
