mod action;
pub use action::Action;

mod run_status;
pub use run_status::RunStatus;

mod task_info;
pub use task_info::TaskInfo;

mod control_state;
pub use control_state::ControlState;

mod outcome;
pub use outcome::Outcome;

mod session_info;
pub use session_info::SessionInfo;

/// Opaque per-invocation identifier used for log correlation.
pub type SessionId = String;

/// Current wall-clock time as fractional seconds since the Unix epoch.
///
/// This is the representation used for every timestamp stored in a control slot.
pub fn epoch_seconds() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
